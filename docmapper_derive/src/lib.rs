use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Fields, Ident, LitBool, LitInt, LitStr, Path, Type,
    parse_macro_input, spanned::Spanned,
};

#[proc_macro_derive(
    Entity,
    attributes(
        entity, identifier, property, decimal, version, created_timestamp, updated_timestamp,
        parent_key, embedded, superclass, transient
    )
)]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_persistent(input, ClassKind::Entity) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(Embeddable, attributes(property, decimal, embedded, transient))]
pub fn derive_embeddable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_persistent(input, ClassKind::Embeddable) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(
    MappedSuperclass,
    attributes(
        mapped_superclass, identifier, property, decimal, version, created_timestamp,
        updated_timestamp, parent_key, embedded, superclass, transient
    )
)]
pub fn derive_mapped_superclass(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_persistent(input, ClassKind::MappedSuperclass) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(IdWrapper)]
pub fn derive_id_wrapper(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_id_wrapper(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    Entity,
    Embeddable,
    MappedSuperclass,
}

impl ClassKind {
    fn derive_name(self) -> &'static str {
        match self {
            Self::Entity => "Entity",
            Self::Embeddable => "Embeddable",
            Self::MappedSuperclass => "MappedSuperclass",
        }
    }

    fn attr_name(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Embeddable => "embeddable",
            Self::MappedSuperclass => "mapped_superclass",
        }
    }

    fn constructor(self) -> Ident {
        match self {
            Self::Entity => format_ident!("entity"),
            Self::Embeddable => format_ident!("embeddable"),
            Self::MappedSuperclass => format_ident!("mapped_superclass"),
        }
    }
}

#[derive(Default)]
struct ClassOptions {
    kind: Option<LitStr>,
    listeners: Vec<Path>,
    callbacks: Vec<(Ident, Ident)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Property,
    Identifier { wrapped: bool },
    Version,
    CreatedTimestamp,
    UpdatedTimestamp,
    ParentKey,
    Embedded,
    Superclass,
    Transient,
}

impl Role {
    fn attr_name(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Identifier { .. } => "identifier",
            Self::Version => "version",
            Self::CreatedTimestamp => "created_timestamp",
            Self::UpdatedTimestamp => "updated_timestamp",
            Self::ParentKey => "parent_key",
            Self::Embedded => "embedded",
            Self::Superclass => "superclass",
            Self::Transient => "transient",
        }
    }

    /// `Field` constructor of a scalar role.
    fn field_constructor(self) -> Option<Ident> {
        let name = match self {
            Self::Property => "new",
            Self::Identifier { .. } => "identifier",
            Self::Version => "version",
            Self::CreatedTimestamp => "created_timestamp",
            Self::UpdatedTimestamp => "updated_timestamp",
            Self::ParentKey => "parent_key",
            Self::Embedded | Self::Superclass | Self::Transient => return None,
        };
        Some(Ident::new(name, Span::call_site()))
    }

    fn takes_property_options(self) -> bool {
        matches!(
            self,
            Self::Property | Self::Version | Self::CreatedTimestamp | Self::UpdatedTimestamp
        )
    }
}

struct FieldOptions {
    role: Role,
    role_attr: Option<Span>,
    property_attr: Option<Span>,
    name: Option<LitStr>,
    optional: bool,
    indexed: Option<bool>,
    mapper: Option<Path>,
    decimal: Option<(LitInt, LitInt)>,
    mode: Option<Ident>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            role: Role::Property,
            role_attr: None,
            property_attr: None,
            name: None,
            optional: false,
            indexed: None,
            mapper: None,
            decimal: None,
            mode: None,
        }
    }
}

impl FieldOptions {
    fn set_role(&mut self, role: Role, attr: &Attribute) -> syn::Result<()> {
        if self.role_attr.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                format!(
                    "#[{}] conflicts with #[{}] on the same field",
                    role.attr_name(),
                    self.role.attr_name()
                ),
            ));
        }
        self.role = role;
        self.role_attr = Some(attr.span());
        Ok(())
    }
}

fn expand_persistent(input: DeriveInput, kind: ClassKind) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            format!("{} does not support generic structs", kind.derive_name()),
        ));
    }

    let class_options = parse_class_options(&input.attrs, kind)?;

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return Err(syn::Error::new(
                    struct_name.span(),
                    format!("{} requires named fields", kind.derive_name()),
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                format!("{} can only be derived for structs", kind.derive_name()),
            ));
        }
    };

    let mut members = Vec::<TokenStream2>::new();
    let mut inherits = Vec::<TokenStream2>::new();

    for field in named_fields {
        let ident = field.ident.clone().ok_or_else(|| {
            syn::Error::new(field.span(), format!("{} requires named fields", kind.derive_name()))
        })?;
        let options = parse_field_options(&field.attrs)?;
        check_field_options(&options, kind, &field.ty, field.span())?;

        let field_name = ident.to_string().trim_start_matches("r#").to_string();
        let ty = &field.ty;

        match options.role {
            Role::Transient => {}
            Role::Superclass => inherits.push(quote! {
                .inherit::<#ty>(|entity: &Self| &entity.#ident, |entity: &mut Self| &mut entity.#ident)
            }),
            Role::Embedded => members.push(embedded_tokens(&ident, &field_name, ty, &options)),
            role => {
                let constructor = role.field_constructor().ok_or_else(|| {
                    syn::Error::new(field.span(), "unexpected field role")
                })?;
                members.push(scalar_field_tokens(&ident, &field_name, ty, &constructor, &options));
            }
        }
    }

    let class_ctor = kind.constructor();
    let kind_call = class_options.kind.as_ref().map(|kind| quote!(.kind(#kind)));
    let callbacks = class_options.callbacks.iter().map(|(variant, method)| {
        let method_name = method.to_string();
        quote! {
            .callback(::docmapper::CallbackType::#variant, #method_name, |entity: &mut Self| {
                entity.#method();
            })
        }
    });
    let listeners = class_options
        .listeners
        .iter()
        .map(|listener| quote!(.listener::<#listener>()));

    Ok(quote! {
        impl ::docmapper::Persistent for #struct_name {
            fn descriptor() -> ::docmapper::ClassDescriptor<Self> {
                ::docmapper::ClassDescriptor::<Self>::#class_ctor()
                    #kind_call
                    .default_constructor()
                    #(#inherits)*
                    #(#members)*
                    #(#callbacks)*
                    #(#listeners)*
            }
        }
    })
}

fn scalar_field_tokens(
    ident: &Ident,
    field_name: &str,
    ty: &Type,
    constructor: &Ident,
    options: &FieldOptions,
) -> TokenStream2 {
    let mut modifiers = Vec::<TokenStream2>::new();
    if let Some(name) = &options.name {
        modifiers.push(quote!(.property_name(#name)));
    }
    if options.optional {
        modifiers.push(quote!(.optional()));
    }
    if let Some(indexed) = options.indexed {
        modifiers.push(quote!(.indexed(#indexed)));
    }
    if let Some(mapper) = &options.mapper {
        modifiers.push(quote!(.mapper(<#mapper as ::std::default::Default>::default())));
    }
    if let Some((precision, scale)) = &options.decimal {
        modifiers.push(quote!(.decimal(#precision, #scale)));
    }
    if let Role::Identifier { wrapped: true } = options.role {
        modifiers.push(quote!(.id_class(<#ty as ::docmapper::IdWrapper>::id_class())));
    }

    quote! {
        .field(
            ::docmapper::Field::<Self, #ty>::#constructor(#field_name)
                .get(|entity: &Self| ::std::clone::Clone::clone(&entity.#ident))
                .set(|entity: &mut Self, value: #ty| entity.#ident = value)
                #(#modifiers)*
        )
    }
}

fn embedded_tokens(ident: &Ident, field_name: &str, ty: &Type, options: &FieldOptions) -> TokenStream2 {
    let (inner, accessors) = match option_inner(ty) {
        Some(inner) => (
            inner,
            quote! {
                .get_opt(|entity: &Self| entity.#ident.as_ref())
                .set_opt(|entity: &mut Self, value: ::std::option::Option<#inner>| entity.#ident = value)
            },
        ),
        None => (
            ty,
            quote! {
                .get(|entity: &Self| &entity.#ident)
                .set(|entity: &mut Self, value: #ty| entity.#ident = value)
            },
        ),
    };
    let name = options.name.as_ref().map(|name| quote!(.property_name(#name)));
    let mode = options.mode.as_ref().map(|mode| quote!(.#mode()));

    quote! {
        .embedded(
            ::docmapper::Embedded::<Self, #inner>::new(#field_name)
                #accessors
                #name
                #mode
        )
    }
}

fn check_field_options(options: &FieldOptions, kind: ClassKind, ty: &Type, span: Span) -> syn::Result<()> {
    if let Some(property_span) = options.property_attr {
        if !options.role.takes_property_options() {
            return Err(syn::Error::new(
                property_span,
                format!(
                    "#[property] and #[decimal] do not apply to #[{}] fields",
                    options.role.attr_name()
                ),
            ));
        }
    }

    if kind == ClassKind::Embeddable {
        match options.role {
            Role::Property | Role::Embedded | Role::Transient => {}
            other => {
                return Err(syn::Error::new(
                    span,
                    format!("Embeddable cannot declare #[{}] fields", other.attr_name()),
                ));
            }
        }
    }

    if let Role::Identifier { wrapped: true } = options.role {
        if option_inner(ty).is_some() {
            return Err(syn::Error::new(
                ty.span(),
                "#[identifier(wrapped)] requires a non-Option wrapper type",
            ));
        }
    }

    if options.role == Role::Superclass && option_inner(ty).is_some() {
        return Err(syn::Error::new(ty.span(), "#[superclass] fields cannot be optional"));
    }

    Ok(())
}

fn parse_class_options(attrs: &[Attribute], kind: ClassKind) -> syn::Result<ClassOptions> {
    let mut options = ClassOptions::default();

    for attr in attrs {
        if !attr.path().is_ident(kind.attr_name()) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                if kind != ClassKind::Entity {
                    return Err(meta.error("kind = \"...\" is only supported on entities"));
                }
                let value = meta.value()?;
                options.kind = Some(value.parse()?);
                return Ok(());
            }

            if meta.path.is_ident("listeners") {
                if kind != ClassKind::Entity {
                    return Err(meta.error("listeners(...) is only supported on entities"));
                }
                meta.parse_nested_meta(|listener| {
                    options.listeners.push(listener.path.clone());
                    Ok(())
                })?;
                return Ok(());
            }

            if meta.path.is_ident("callbacks") {
                meta.parse_nested_meta(|callback| {
                    let variant = callback_variant(&callback.path).ok_or_else(|| {
                        callback.error(
                            "Unsupported callback. Supported: pre_insert, post_insert, pre_update, post_update, pre_delete, post_delete, post_load",
                        )
                    })?;
                    let value = callback.value()?;
                    let method: LitStr = value.parse()?;
                    options.callbacks.push((variant, method.parse::<Ident>()?));
                    Ok(())
                })?;
                return Ok(());
            }

            Err(meta.error(format!(
                "Unsupported #[{}(...)] option. Supported: kind = \"...\", listeners(...), callbacks(...)",
                kind.attr_name()
            )))
        })?;
    }

    Ok(options)
}

fn callback_variant(path: &Path) -> Option<Ident> {
    let variant = match path.get_ident()?.to_string().as_str() {
        "pre_insert" => "PreInsert",
        "post_insert" => "PostInsert",
        "pre_update" => "PreUpdate",
        "post_update" => "PostUpdate",
        "pre_delete" => "PreDelete",
        "post_delete" => "PostDelete",
        "post_load" => "PostLoad",
        _ => return None,
    };
    Some(Ident::new(variant, path.span()))
}

fn parse_field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        let path = attr.path();

        if path.is_ident("identifier") {
            let mut wrapped = false;
            if let syn::Meta::List(_) = &attr.meta {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("wrapped") {
                        wrapped = true;
                        return Ok(());
                    }
                    Err(meta.error("Unsupported #[identifier(...)] option. Supported: wrapped"))
                })?;
            }
            options.set_role(Role::Identifier { wrapped }, attr)?;
            continue;
        }

        let marker = [
            ("version", Role::Version),
            ("created_timestamp", Role::CreatedTimestamp),
            ("updated_timestamp", Role::UpdatedTimestamp),
            ("parent_key", Role::ParentKey),
            ("superclass", Role::Superclass),
            ("transient", Role::Transient),
        ]
        .into_iter()
        .find(|(name, _)| path.is_ident(name));
        if let Some((_, role)) = marker {
            attr.meta.require_path_only()?;
            options.set_role(role, attr)?;
            continue;
        }

        if path.is_ident("embedded") {
            options.set_role(Role::Embedded, attr)?;
            if let syn::Meta::List(_) = &attr.meta {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        options.name = Some(meta.value()?.parse()?);
                        return Ok(());
                    }
                    if meta.path.is_ident("imploded") || meta.path.is_ident("exploded") {
                        if options.mode.is_some() {
                            return Err(meta.error("embedded mode is declared twice"));
                        }
                        options.mode = meta.path.get_ident().cloned();
                        return Ok(());
                    }
                    Err(meta.error(
                        "Unsupported #[embedded(...)] option. Supported: name = \"...\", imploded, exploded",
                    ))
                })?;
            }
            continue;
        }

        if path.is_ident("property") {
            options.property_attr = Some(attr.span());
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    options.name = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                if meta.path.is_ident("optional") {
                    options.optional = true;
                    return Ok(());
                }
                if meta.path.is_ident("indexed") {
                    let indexed = if meta.input.peek(syn::Token![=]) {
                        let lit: LitBool = meta.value()?.parse()?;
                        lit.value
                    } else {
                        true
                    };
                    options.indexed = Some(indexed);
                    return Ok(());
                }
                if meta.path.is_ident("mapper") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.mapper = Some(lit.parse()?);
                    return Ok(());
                }
                Err(meta.error(
                    "Unsupported #[property(...)] option. Supported: name = \"...\", optional, indexed = <bool>, mapper = \"Path\"",
                ))
            })?;
            continue;
        }

        if path.is_ident("decimal") {
            options.property_attr = Some(attr.span());
            let mut precision: Option<LitInt> = None;
            let mut scale: Option<LitInt> = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("precision") {
                    precision = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                if meta.path.is_ident("scale") {
                    scale = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                Err(meta.error("Unsupported #[decimal(...)] option. Supported: precision = <u32>, scale = <u32>"))
            })?;
            match (precision, scale) {
                (Some(precision), Some(scale)) => options.decimal = Some((precision, scale)),
                _ => {
                    return Err(syn::Error::new(
                        attr.span(),
                        "#[decimal(...)] requires both precision and scale",
                    ));
                }
            }
        }
    }

    Ok(options)
}

/// `T` of an `Option<T>` type, recognised by its last path segment.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first()? {
        syn::GenericArgument::Type(inner) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn expand_id_wrapper(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "IdWrapper does not support generic structs",
        ));
    }

    let fields = match input.data {
        Data::Struct(data) => data.fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "IdWrapper can only be derived for structs",
            ));
        }
    };

    if fields.len() != 1 {
        return Err(syn::Error::new(
            struct_name.span(),
            "IdWrapper requires exactly one field holding the identifier",
        ));
    }

    let (scalar, reader_name, read, construct) = match &fields {
        Fields::Unnamed(unnamed) => {
            let index = syn::Index::from(0);
            (
                unnamed.unnamed[0].ty.clone(),
                "0".to_string(),
                quote!(wrapper.#index),
                quote!(Self(value)),
            )
        }
        Fields::Named(named) => {
            let field = &named.named[0];
            let ident = field.ident.clone().ok_or_else(|| {
                syn::Error::new(field.span(), "IdWrapper requires a named or tuple field")
            })?;
            (
                field.ty.clone(),
                ident.to_string(),
                quote!(wrapper.#ident),
                quote!(Self { #ident: value }),
            )
        }
        Fields::Unit => {
            return Err(syn::Error::new(
                struct_name.span(),
                "IdWrapper requires exactly one field holding the identifier",
            ));
        }
    };

    Ok(quote! {
        impl ::docmapper::DomainType for #struct_name {
            fn field_type() -> ::docmapper::FieldType {
                ::docmapper::FieldType::required(::docmapper::DeclaredType::custom::<Self>())
            }

            fn into_domain(self) -> ::docmapper::DomainValue {
                ::docmapper::DomainValue::object(self)
            }

            fn from_domain(value: ::docmapper::DomainValue) -> ::docmapper::Result<Self> {
                value.into_object::<Self>()
            }
        }

        impl ::docmapper::IdWrapper for #struct_name {
            type Scalar = #scalar;

            fn id_class() -> ::docmapper::IdClass<Self, Self::Scalar> {
                ::docmapper::IdClass::new()
                    .reader(#reader_name, |wrapper: &Self| ::std::clone::Clone::clone(&#read))
                    .constructor("new", |value: #scalar| #construct)
            }
        }
    })
}
