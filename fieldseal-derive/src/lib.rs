//! Derive macros for `fieldseal`.
//!
//! `#[derive(Entity)]` implements `fieldseal::entity::Entity` and
//! `fieldseal::metadata::Described` for a struct with named fields, so the
//! struct can be registered in a `MetadataRegistry` and processed by the
//! interceptor without hand-written accessors.

#![warn(clippy::pedantic, clippy::nursery)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Field, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

/// Derive macro for encrypted entities.
///
/// Struct attributes:
///
/// - `#[entity(name = "...")]` registers the type under another name
/// - `#[entity(key_bearer)]` marks the struct as a document owning its own
///   key; requires one `#[entity(id)]` and one `#[entity(key)]` field
///
/// Field attributes:
///
/// - `encrypted`: a `String` or `Option<String>` sealed in place
/// - `embedded`: a nested entity (`T`, `Option<T>`, `Box<T>`, `Option<Box<T>>`)
/// - `parent`: the ancestor this type extends; unknown attributes are delegated to it
/// - `document`: the related key-bearing document (its type must derive `Entity` too)
/// - `id` / `key`: identity and stored key of a key-bearer; the document
///   identity is `TypeName#id`, so ids only need to be unique per type
///
/// # Example
///
/// ```rust,ignore
/// use fieldseal::Entity;
///
/// #[derive(Entity)]
/// struct Record {
///     #[entity(encrypted)]
///     notes: Option<String>,
///     #[entity(document)]
///     document: Option<Document>,
/// }
///
/// #[derive(Entity)]
/// struct Invoice {
///     #[entity(parent)]
///     record: Record,
///     #[entity(encrypted)]
///     iban: String,
///     #[entity(embedded)]
///     billing: Option<Address>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Plain,
    Encrypted,
    Embedded,
    Parent,
    Document,
    Id,
    Key,
}

/// How a field wraps the type it holds.
enum Shape<'a> {
    Direct(&'a Type),
    Optional(&'a Type),
    Boxed(&'a Type),
    OptionalBoxed(&'a Type),
}

impl<'a> Shape<'a> {
    fn of(ty: &'a Type) -> Self {
        if let Some(inner) = single_generic(ty, "Option") {
            return single_generic(inner, "Box").map_or(Self::Optional(inner), Self::OptionalBoxed);
        }
        single_generic(ty, "Box").map_or(Self::Direct(ty), Self::Boxed)
    }

    const fn inner(&self) -> &'a Type {
        match self {
            Self::Direct(ty) | Self::Optional(ty) | Self::Boxed(ty) | Self::OptionalBoxed(ty) => ty,
        }
    }

    const fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_) | Self::OptionalBoxed(_))
    }
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else { return None };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

struct TypeOptions {
    name: Option<LitStr>,
    key_bearer: bool,
}

fn type_options(input: &DeriveInput) -> syn::Result<TypeOptions> {
    let mut options = TypeOptions { name: None, key_bearer: false };
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                options.name = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("key_bearer") {
                options.key_bearer = true;
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"` or `key_bearer`"))
            }
        })?;
    }
    Ok(options)
}

fn field_role(field: &Field) -> syn::Result<Role> {
    let mut role = Role::Plain;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            let next = [
                ("encrypted", Role::Encrypted),
                ("embedded", Role::Embedded),
                ("parent", Role::Parent),
                ("document", Role::Document),
                ("id", Role::Id),
                ("key", Role::Key),
            ]
            .into_iter()
            .find(|(name, _)| meta.path.is_ident(name))
            .map(|(_, role)| role)
            .ok_or_else(|| meta.error("unsupported entity field attribute"))?;

            if role != Role::Plain {
                return Err(meta.error("a field can carry only one entity role"));
            }
            role = next;
            Ok(())
        })?;
    }
    Ok(role)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(ident, "Entity can only be derived for structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(ident, "Entity requires named fields"));
    };

    let options = type_options(input)?;
    let type_name = options.name.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let mut decl_calls = Vec::new();
    let mut describe_deps = Vec::new();
    let mut get_arms = Vec::new();
    let mut set_arms = Vec::new();
    let mut embedded_arms = Vec::new();
    let mut parent: Option<(&Ident, &Type)> = None;
    let mut document: Option<(&Ident, Shape)> = None;
    let mut id_field: Option<&Ident> = None;
    let mut key_field: Option<(&Ident, Shape)> = None;

    for field in &named.named {
        let Some(name) = field.ident.as_ref() else { continue };
        let attr_name = LitStr::new(&name.to_string(), name.span());
        let role = field_role(field)?;

        match role {
            Role::Plain => decl_calls.push(quote!(.plain(#attr_name))),
            Role::Encrypted => {
                decl_calls.push(quote!(.encrypted(#attr_name)));
                if Shape::of(&field.ty).is_optional() {
                    get_arms.push(quote!(#attr_name => ::core::result::Result::Ok(self.#name.clone())));
                    set_arms.push(quote!(#attr_name => {
                        self.#name = value;
                        ::core::result::Result::Ok(())
                    }));
                } else {
                    get_arms.push(quote!(
                        #attr_name => ::core::result::Result::Ok(::core::option::Option::Some(self.#name.clone()))
                    ));
                    set_arms.push(quote!(#attr_name => {
                        self.#name = value.unwrap_or_default();
                        ::core::result::Result::Ok(())
                    }));
                }
            }
            Role::Embedded => {
                decl_calls.push(quote!(.embedded(#attr_name)));
                let shape = Shape::of(&field.ty);
                let inner = shape.inner();
                describe_deps.push(quote!(
                    <#inner as ::fieldseal::metadata::Described>::describe(registry);
                ));
                let borrow = match shape {
                    Shape::Direct(_) => quote!(::core::option::Option::Some(&mut self.#name)),
                    Shape::Boxed(_) => quote!(::core::option::Option::Some(&mut *self.#name)),
                    Shape::Optional(_) => quote!(self.#name.as_mut()),
                    Shape::OptionalBoxed(_) => quote!(self.#name.as_deref_mut()),
                };
                embedded_arms.push(quote!(
                    #attr_name => ::core::result::Result::Ok(
                        #borrow.map(|e| e as &mut dyn ::fieldseal::entity::Entity)
                    )
                ));
            }
            Role::Parent => {
                if parent.is_some() {
                    return Err(syn::Error::new_spanned(field, "only one `parent` field is allowed"));
                }
                parent = Some((name, &field.ty));
            }
            Role::Document => {
                let shape = Shape::of(&field.ty);
                let inner = shape.inner();
                describe_deps.push(quote!(
                    <#inner as ::fieldseal::metadata::Described>::describe(registry);
                ));
                document = Some((name, shape));
            }
            Role::Id => id_field = Some(name),
            Role::Key => key_field = Some((name, Shape::of(&field.ty))),
        }
    }

    let extends = parent.map(|(_, ty)| {
        quote!(.extends(<#ty as ::fieldseal::metadata::Described>::TYPE_NAME))
    });
    if let Some((_, ty)) = parent {
        describe_deps.insert(0, quote!(<#ty as ::fieldseal::metadata::Described>::describe(registry);));
    }

    let fallback = |call: TokenStream2| match parent {
        Some((field, _)) => quote!(_ => ::fieldseal::entity::Entity::#call(&mut self.#field, attribute)),
        None => quote!(_ => ::core::result::Result::Err(
            ::fieldseal::error::Error::unknown_attribute(<Self as ::fieldseal::metadata::Described>::TYPE_NAME, attribute)
        )),
    };
    let get_fallback = match parent {
        Some((field, _)) => quote!(_ => ::fieldseal::entity::Entity::get(&self.#field, attribute)),
        None => fallback(quote!(get)),
    };
    let set_fallback = match parent {
        Some((field, _)) => quote!(_ => ::fieldseal::entity::Entity::set(&mut self.#field, attribute, value)),
        None => fallback(quote!(set)),
    };
    let embedded_fallback = fallback(quote!(embedded_mut));

    let key_bearer = key_bearer_fn(options.key_bearer, ident, id_field, key_field, document, parent)?;

    Ok(quote! {
        impl #impl_generics ::fieldseal::metadata::Described for #ident #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn type_decl() -> ::fieldseal::metadata::TypeDecl {
                ::fieldseal::metadata::TypeDecl::new(Self::TYPE_NAME)
                    #extends
                    #(#decl_calls)*
            }

            fn describe(registry: &mut ::fieldseal::metadata::MetadataRegistry) {
                if registry.contains(Self::TYPE_NAME) {
                    return;
                }
                registry.insert(Self::type_decl());
                #(#describe_deps)*
            }
        }

        impl #impl_generics ::fieldseal::entity::Entity for #ident #ty_generics #where_clause {
            fn type_name(&self) -> &str {
                <Self as ::fieldseal::metadata::Described>::TYPE_NAME
            }

            #key_bearer

            #[allow(clippy::match_single_binding)]
            fn get(
                &self,
                attribute: &str,
            ) -> ::core::result::Result<::core::option::Option<::std::string::String>, ::fieldseal::error::Error> {
                match attribute {
                    #(#get_arms,)*
                    #get_fallback,
                }
            }

            #[allow(clippy::match_single_binding, unused_variables)]
            fn set(
                &mut self,
                attribute: &str,
                value: ::core::option::Option<::std::string::String>,
            ) -> ::core::result::Result<(), ::fieldseal::error::Error> {
                match attribute {
                    #(#set_arms,)*
                    #set_fallback,
                }
            }

            #[allow(clippy::match_single_binding)]
            fn embedded_mut(
                &mut self,
                attribute: &str,
            ) -> ::core::result::Result<
                ::core::option::Option<&mut dyn ::fieldseal::entity::Entity>,
                ::fieldseal::error::Error,
            > {
                match attribute {
                    #(#embedded_arms,)*
                    #embedded_fallback,
                }
            }
        }
    })
}

fn key_bearer_fn(
    is_key_bearer: bool,
    ident: &Ident,
    id_field: Option<&Ident>,
    key_field: Option<(&Ident, Shape)>,
    document: Option<(&Ident, Shape)>,
    parent: Option<(&Ident, &Type)>,
) -> syn::Result<TokenStream2> {
    let body = if is_key_bearer {
        let (Some(id), Some((key, shape))) = (id_field, key_field) else {
            return Err(syn::Error::new_spanned(
                ident,
                "`key_bearer` requires an `#[entity(id)]` and an `#[entity(key)]` field",
            ));
        };
        let stored = if shape.is_optional() {
            quote!(self.#key.clone())
        } else {
            quote!(::core::option::Option::Some(self.#key.clone()))
        };
        quote!(::core::option::Option::Some(
            ::fieldseal::entity::KeyBearer::scoped(
                <Self as ::fieldseal::metadata::Described>::TYPE_NAME,
                &self.#id,
                #stored,
            )
        ))
    } else if let Some((field, shape)) = document {
        match shape {
            Shape::Direct(_) => quote!(::fieldseal::entity::Entity::key_bearer(&self.#field)),
            Shape::Boxed(_) => quote!(::fieldseal::entity::Entity::key_bearer(&*self.#field)),
            Shape::Optional(_) => quote!(
                self.#field.as_ref().and_then(|d| ::fieldseal::entity::Entity::key_bearer(d))
            ),
            Shape::OptionalBoxed(_) => quote!(
                self.#field.as_deref().and_then(|d| ::fieldseal::entity::Entity::key_bearer(d))
            ),
        }
    } else if let Some((field, _)) = parent {
        quote!(::fieldseal::entity::Entity::key_bearer(&self.#field))
    } else {
        return Ok(TokenStream2::new());
    };

    Ok(quote! {
        fn key_bearer(&self) -> ::core::option::Option<::fieldseal::entity::KeyBearer> {
            #body
        }
    })
}
