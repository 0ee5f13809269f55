use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use super::invoke::{Lift, ListenerFn, ReceiverFn, downcast_mut, downcast_ref};
use crate::core::simple_type_name;

/// Lifecycle hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallbackType {
    PreInsert,
    PostInsert,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
    PostLoad,
}

impl CallbackType {
    pub const ALL: [CallbackType; 7] = [
        Self::PreInsert,
        Self::PostInsert,
        Self::PreUpdate,
        Self::PostUpdate,
        Self::PreDelete,
        Self::PostDelete,
        Self::PostLoad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PreInsert => "PreInsert",
            Self::PostInsert => "PostInsert",
            Self::PreUpdate => "PreUpdate",
            Self::PostUpdate => "PostUpdate",
            Self::PreDelete => "PreDelete",
            Self::PostDelete => "PostDelete",
            Self::PostLoad => "PostLoad",
        }
    }
}

impl fmt::Display for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of the entity argument of a listener method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Entity { type_id: TypeId, name: &'static str },
    /// Accepts any entity.
    Any,
}

impl ParamType {
    pub fn accepts(&self, entity: TypeId) -> bool {
        match self {
            Self::Entity { type_id, .. } => *type_id == entity,
            Self::Any => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Entity { name, .. } => name,
            Self::Any => "dyn Any",
        }
    }
}

/// Shape of a callback method.
#[derive(Clone)]
pub enum Callable {
    /// `fn(&mut self)` on the owning type.
    Receiver {
        owner: TypeId,
        owner_name: &'static str,
        invoke: ReceiverFn,
    },
    /// `fn(&self, entity)` on a listener type.
    WithEntity {
        listener: TypeId,
        listener_name: &'static str,
        param: ParamType,
        invoke: ListenerFn,
    },
}

impl Callable {
    pub fn owner_name(&self) -> &'static str {
        match self {
            Self::Receiver { owner_name, .. } => owner_name,
            Self::WithEntity { listener_name, .. } => listener_name,
        }
    }
}

/// A named method bound to one callback type.
#[derive(Clone)]
pub struct ListenerMethod {
    pub(crate) name: String,
    pub(crate) callback: CallbackType,
    pub(crate) callable: Callable,
}

impl ListenerMethod {
    /// A method taking only its receiver, as declared on an entity.
    pub fn receiver<T: Any>(
        callback: CallbackType,
        name: impl Into<String>,
        method: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback,
            callable: Callable::Receiver {
                owner: TypeId::of::<T>(),
                owner_name: simple_type_name::<T>(),
                invoke: Arc::new(move |any: &mut dyn Any| {
                    method(downcast_mut::<T>(any)?);
                    Ok(())
                }),
            },
        }
    }

    /// A listener method receiving the entity `E`.
    pub fn with_entity<L: Any, E: Any>(
        callback: CallbackType,
        name: impl Into<String>,
        method: impl Fn(&L, &mut E) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback,
            callable: Callable::WithEntity {
                listener: TypeId::of::<L>(),
                listener_name: simple_type_name::<L>(),
                param: ParamType::Entity {
                    type_id: TypeId::of::<E>(),
                    name: simple_type_name::<E>(),
                },
                invoke: Arc::new(move |listener: &dyn Any, entity: &mut dyn Any| {
                    method(downcast_ref::<L>(listener)?, downcast_mut::<E>(entity)?);
                    Ok(())
                }),
            },
        }
    }

    /// A listener method accepting any entity.
    pub fn with_any_entity<L: Any>(
        callback: CallbackType,
        name: impl Into<String>,
        method: impl Fn(&L, &mut dyn Any) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback,
            callable: Callable::WithEntity {
                listener: TypeId::of::<L>(),
                listener_name: simple_type_name::<L>(),
                param: ParamType::Any,
                invoke: Arc::new(move |listener: &dyn Any, entity: &mut dyn Any| {
                    method(downcast_ref::<L>(listener)?, entity);
                    Ok(())
                }),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callback(&self) -> CallbackType {
        self.callback
    }
}

pub type ListenerFactory = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// A listener type and its callback methods.
#[derive(Clone)]
pub struct ListenerDescriptor {
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) factory: ListenerFactory,
    pub(crate) methods: Vec<ListenerMethod>,
}

impl ListenerDescriptor {
    pub fn new<L: Any + Send + Sync>(factory: impl Fn() -> L + Send + Sync + 'static) -> Self {
        Self {
            class_name: simple_type_name::<L>(),
            type_id: TypeId::of::<L>(),
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Any + Send + Sync>),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: ListenerMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Rebinds methods taking the mapped superclass `base` to the class
    /// inheriting it. Methods accepting any entity are left alone.
    pub(crate) fn lifted(
        mut self,
        base: TypeId,
        class: TypeId,
        class_name: &'static str,
        lift: &Lift,
    ) -> Self {
        for method in &mut self.methods {
            if let Callable::WithEntity { param, invoke, .. } = &mut method.callable {
                if matches!(param, ParamType::Entity { type_id, .. } if *type_id == base) {
                    *param = ParamType::Entity {
                        type_id: class,
                        name: class_name,
                    };
                    *invoke = lift.listener(invoke.clone());
                }
            }
        }
        self
    }
}

/// A type whose methods observe entity lifecycle events.
pub trait EntityListener: Send + Sync + 'static {
    fn listener() -> ListenerDescriptor;
}
