//! Callback registries.
//!
//! Internal callbacks are methods of the entity (or one of its mapped
//! superclasses) taking only the receiver. External callbacks live on
//! listener types and receive the entity. Either way a registry holds at most
//! one callback per [`CallbackType`].

use std::any::{Any, TypeId};
use std::sync::Arc;
use log::trace;
use crate::core::{MappingError, Result};
use crate::descriptor::invoke::{ListenerFn, ReceiverFn};
use crate::descriptor::listener::{Callable, CallbackType, ListenerDescriptor, ListenerMethod};

#[derive(Clone)]
enum Invoker {
    Receiver(ReceiverFn),
    Listener {
        instance: Arc<dyn Any + Send + Sync>,
        invoke: ListenerFn,
    },
}

/// A callback method bound to its registry.
#[derive(Clone)]
pub struct BoundCallback {
    callback: CallbackType,
    method: String,
    owner: &'static str,
    invoker: Invoker,
}

impl BoundCallback {
    pub fn callback(&self) -> CallbackType {
        self.callback
    }

    pub fn method_name(&self) -> &str {
        &self.method
    }

    /// Type declaring the method.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub(crate) fn invoke(&self, entity: &mut dyn Any) -> Result<()> {
        trace!("Invoking {} callback {}::{}", self.callback, self.owner, self.method);
        match &self.invoker {
            Invoker::Receiver(invoke) => invoke(entity),
            Invoker::Listener { instance, invoke } => invoke(&**instance, entity),
        }
    }
}

impl std::fmt::Debug for BoundCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}::{}", self.callback, self.owner, self.method)
    }
}

/// Callbacks of one owner, in declaration order.
#[derive(Debug, Clone)]
pub struct ListenerMetadata {
    owner: &'static str,
    external: bool,
    callbacks: Vec<BoundCallback>,
}

impl ListenerMetadata {
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn get(&self, callback: CallbackType) -> Option<&BoundCallback> {
        self.callbacks.iter().find(|c| c.callback == callback)
    }

    pub fn contains(&self, callback: CallbackType) -> bool {
        self.get(callback).is_some()
    }

    pub fn callbacks(&self) -> &[BoundCallback] {
        &self.callbacks
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// All callbacks of an entity.
///
/// For one callback type, external listeners fire in registration order,
/// then the entity's own callback.
#[derive(Debug, Clone)]
pub struct EntityListenersMetadata {
    pub(crate) external: Vec<ListenerMetadata>,
    pub(crate) internal: ListenerMetadata,
}

impl EntityListenersMetadata {
    pub fn external(&self) -> &[ListenerMetadata] {
        &self.external
    }

    pub fn internal(&self) -> &ListenerMetadata {
        &self.internal
    }

    pub fn has_callbacks(&self, callback: CallbackType) -> bool {
        self.internal.contains(callback) || self.external.iter().any(|l| l.contains(callback))
    }

    pub(crate) fn invoke(&self, callback: CallbackType, entity: &mut dyn Any) -> Result<()> {
        for listener in &self.external {
            if let Some(bound) = listener.get(callback) {
                bound.invoke(entity)?;
            }
        }
        if let Some(bound) = self.internal.get(callback) {
            bound.invoke(entity)?;
        }
        Ok(())
    }
}

/// Builds the internal registry of `class`.
///
/// `inherited` are the superclass callbacks, already lifted onto `class`;
/// a method of `own` with the same name replaces them.
pub(crate) fn introspect_internal(
    class: &'static str,
    type_id: TypeId,
    inherited: Vec<ListenerMethod>,
    own: Vec<ListenerMethod>,
) -> Result<ListenerMetadata> {
    let mut methods: Vec<ListenerMethod> = inherited
        .into_iter()
        .filter(|m| !own.iter().any(|o| o.name == m.name))
        .collect();
    methods.extend(own);

    let mut callbacks: Vec<BoundCallback> = Vec::with_capacity(methods.len());
    for method in methods {
        let invoker = match method.callable {
            Callable::Receiver { owner, invoke, .. } if owner == type_id => Invoker::Receiver(invoke),
            Callable::Receiver { owner_name, .. } => {
                return Err(invalid_method(
                    class,
                    &method.name,
                    format!("receiver type {} is not part of the hierarchy", owner_name),
                ));
            }
            Callable::WithEntity { .. } => {
                return Err(invalid_method(
                    class,
                    &method.name,
                    "callbacks declared on an entity take no arguments".into(),
                ));
            }
        };
        push_unique(
            &mut callbacks,
            class,
            BoundCallback {
                callback: method.callback,
                method: method.name,
                owner: class,
                invoker,
            },
        )?;
    }

    Ok(ListenerMetadata {
        owner: class,
        external: false,
        callbacks,
    })
}

/// Validates `listener` against the entity `entity_type` and instantiates it.
pub(crate) fn introspect_external(
    entity: &'static str,
    entity_type: TypeId,
    listener: &ListenerDescriptor,
) -> Result<ListenerMetadata> {
    let class = listener.class_name;
    if listener.methods.is_empty() {
        return Err(MappingError::InvalidListener {
            class: class.to_string(),
            reason: "no callback methods declared".into(),
        });
    }

    let instance = (listener.factory)();
    let mut callbacks: Vec<BoundCallback> = Vec::with_capacity(listener.methods.len());
    for method in &listener.methods {
        let invoke = match &method.callable {
            Callable::Receiver { .. } => {
                return Err(invalid_method(
                    class,
                    &method.name,
                    "listener methods take the entity as their only argument".into(),
                ));
            }
            Callable::WithEntity { listener: owner, listener_name, .. } if *owner != listener.type_id => {
                return Err(invalid_method(
                    class,
                    &method.name,
                    format!("method belongs to {}", listener_name),
                ));
            }
            Callable::WithEntity { param, .. } if !param.accepts(entity_type) => {
                return Err(invalid_method(
                    class,
                    &method.name,
                    format!("parameter type {} does not accept entity {}", param.name(), entity),
                ));
            }
            Callable::WithEntity { invoke, .. } => invoke.clone(),
        };
        push_unique(
            &mut callbacks,
            class,
            BoundCallback {
                callback: method.callback,
                method: method.name.clone(),
                owner: class,
                invoker: Invoker::Listener {
                    instance: instance.clone(),
                    invoke,
                },
            },
        )?;
    }

    Ok(ListenerMetadata {
        owner: class,
        external: true,
        callbacks,
    })
}

fn push_unique(callbacks: &mut Vec<BoundCallback>, class: &str, bound: BoundCallback) -> Result<()> {
    if let Some(existing) = callbacks.iter().find(|c| c.callback == bound.callback) {
        return Err(MappingError::DuplicateCallback {
            class: class.to_string(),
            callback: bound.callback.to_string(),
            first: existing.method.clone(),
            second: bound.method,
        });
    }
    callbacks.push(bound);
    Ok(())
}

fn invalid_method(class: &str, method: &str, reason: String) -> MappingError {
    MappingError::InvalidListenerMethod {
        class: class.to_string(),
        method: method.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Ticket {
        events: Vec<&'static str>,
    }

    struct Other;

    #[derive(Default)]
    struct Audit {
        seen: AtomicUsize,
    }

    fn internal(methods: Vec<ListenerMethod>) -> Result<ListenerMetadata> {
        introspect_internal("Ticket", TypeId::of::<Ticket>(), Vec::new(), methods)
    }

    #[test]
    fn test_internal_lookup_by_type() {
        let registry = internal(vec![
            ListenerMethod::receiver::<Ticket>(CallbackType::PreInsert, "before", |t| t.events.push("pre")),
            ListenerMethod::receiver::<Ticket>(CallbackType::PostInsert, "after", |t| t.events.push("post")),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(CallbackType::PreInsert).unwrap().method_name(), "before");
        assert_eq!(registry.get(CallbackType::PostInsert).unwrap().method_name(), "after");
        assert!(registry.get(CallbackType::PostLoad).is_none());

        let mut ticket = Ticket::default();
        registry.get(CallbackType::PreInsert).unwrap().invoke(&mut ticket).unwrap();
        assert_eq!(ticket.events, vec!["pre"]);
    }

    #[test]
    fn test_internal_duplicates_rejected() {
        let err = internal(vec![
            ListenerMethod::receiver::<Ticket>(CallbackType::PreUpdate, "one", |_| {}),
            ListenerMethod::receiver::<Ticket>(CallbackType::PreUpdate, "two", |_| {}),
        ])
        .unwrap_err();
        match err {
            MappingError::DuplicateCallback { first, second, callback, .. } => {
                assert_eq!((first.as_str(), second.as_str()), ("one", "two"));
                assert_eq!(callback, "PreUpdate");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_internal_rejects_foreign_shapes() {
        let err = internal(vec![ListenerMethod::receiver::<Other>(CallbackType::PreInsert, "x", |_| {})])
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidListenerMethod { .. }));

        let err = internal(vec![ListenerMethod::with_entity::<Audit, Ticket>(
            CallbackType::PreInsert,
            "x",
            |_, _| {},
        )])
        .unwrap_err();
        assert!(matches!(err, MappingError::InvalidListenerMethod { .. }));
    }

    #[test]
    fn test_override_by_name_replaces_inherited() {
        let inherited = vec![ListenerMethod::receiver::<Ticket>(CallbackType::PreInsert, "stamp", |t| {
            t.events.push("base")
        })];
        let own = vec![ListenerMethod::receiver::<Ticket>(CallbackType::PreInsert, "stamp", |t| {
            t.events.push("own")
        })];
        let registry = introspect_internal("Ticket", TypeId::of::<Ticket>(), inherited, own).unwrap();

        let mut ticket = Ticket::default();
        registry.get(CallbackType::PreInsert).unwrap().invoke(&mut ticket).unwrap();
        assert_eq!(ticket.events, vec!["own"]);
    }

    #[test]
    fn test_external_listener_validation() {
        let empty = ListenerDescriptor::new(Audit::default);
        let err = introspect_external("Ticket", TypeId::of::<Ticket>(), &empty).unwrap_err();
        assert!(matches!(err, MappingError::InvalidListener { .. }));

        let receiver_only = ListenerDescriptor::new(Audit::default)
            .method(ListenerMethod::receiver::<Audit>(CallbackType::PreInsert, "x", |_| {}));
        let err = introspect_external("Ticket", TypeId::of::<Ticket>(), &receiver_only).unwrap_err();
        assert!(matches!(err, MappingError::InvalidListenerMethod { .. }));

        let wrong_param = ListenerDescriptor::new(Audit::default).method(
            ListenerMethod::with_entity::<Audit, Other>(CallbackType::PreInsert, "x", |_, _| {}),
        );
        let err = introspect_external("Ticket", TypeId::of::<Ticket>(), &wrong_param).unwrap_err();
        assert!(err.to_string().contains("does not accept"));
    }

    #[test]
    fn test_external_fires_before_internal() {
        let audit = ListenerDescriptor::new(Audit::default)
            .method(ListenerMethod::with_entity::<Audit, Ticket>(
                CallbackType::PreInsert,
                "audit",
                |audit, ticket| {
                    audit.seen.fetch_add(1, Ordering::SeqCst);
                    ticket.events.push("external");
                },
            ))
            .method(ListenerMethod::with_any_entity::<Audit>(CallbackType::PostLoad, "loaded", |audit, _| {
                audit.seen.fetch_add(1, Ordering::SeqCst);
            }));

        let listeners = EntityListenersMetadata {
            external: vec![introspect_external("Ticket", TypeId::of::<Ticket>(), &audit).unwrap()],
            internal: internal(vec![ListenerMethod::receiver::<Ticket>(
                CallbackType::PreInsert,
                "own",
                |t| t.events.push("internal"),
            )])
            .unwrap(),
        };

        let mut ticket = Ticket::default();
        listeners.invoke(CallbackType::PreInsert, &mut ticket).unwrap();
        assert_eq!(ticket.events, vec!["external", "internal"]);
        assert!(listeners.has_callbacks(CallbackType::PostLoad));
        assert!(!listeners.has_callbacks(CallbackType::PreDelete));
    }
}
