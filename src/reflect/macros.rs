//! The `reflect_struct!` member-table macro.

/// Define a struct together with its static member table.
///
/// The macro emits the struct definition unchanged, an implementation of
/// [`crate::reflect::Reflect`] listing every field as a readable/writable
/// member, and a [`crate::reflect::MemberValue`] implementation so the
/// struct can itself appear as a member of another reflected struct.
///
/// Field types must implement `MemberValue` (all scalars, `String`,
/// `Option<T>`, `Vec<T>`, `VecDeque<T>` and other `reflect_struct!` types
/// do) and the struct must derive `Clone`. `Default` is not required: the
/// table carries its own zero-argument constructor built from the field
/// defaults.
///
/// Two optional trailing sections extend the table:
///
/// - `properties { name: Type { get = path, set = path } }` - accessor-backed
///   members; `get` is `fn(&Self) -> Type`, `set` is `fn(&mut Self, Type)`.
///   A property without `set` is read-only unless its type is a collection,
///   which reports as writable per the member contract.
/// - `methods { name: Type }` - zero-argument inherent methods surfaced as
///   read-only members; only mapped when the configuration enables method
///   mapping.
///
/// # Example
///
/// ```rust
/// use mapforge::reflect_struct;
///
/// reflect_struct! {
///     #[derive(Clone, Debug, PartialEq)]
///     pub struct Person {
///         pub id: i64,
///         pub name: String,
///         pub nickname: Option<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! reflect_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $fty:ty ),* $(,)?
        }
        $(properties {
            $( $pname:ident : $pty:ty { get = $pget:path $(, set = $pset:path)? $(,)? } ),* $(,)?
        })?
        $(methods {
            $( $mname:ident : $mty:ty ),* $(,)?
        })?
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $fty, )*
        }

        impl $name {
            #[doc(hidden)]
            pub fn __reflect_default() -> Self {
                Self {
                    $( $field: ::core::default::Default::default(), )*
                }
            }
        }

        impl $crate::reflect::Reflect for $name {
            fn build_type_info() -> $crate::reflect::TypeInfo {
                let members: $crate::__private::boxcar::Vec<$crate::reflect::MemberInfo> =
                    $crate::__private::boxcar::Vec::new();

                $(
                    members.push($crate::reflect::MemberInfo {
                        descriptor: $crate::reflect::MemberDescriptor {
                            name: stringify!($field),
                            declaring_type: ::core::any::type_name::<$name>(),
                            kind: $crate::reflect::MemberKind::Field,
                            value_type: ::core::any::TypeId::of::<$fty>(),
                            value_type_name: ::core::any::type_name::<$fty>(),
                            readable: true,
                            writable: true,
                        },
                        getter: ::core::option::Option::Some({
                            fn get(
                                src: &dyn ::core::any::Any,
                            ) -> $crate::Result<
                                ::core::option::Option<::std::boxed::Box<dyn ::core::any::Any>>,
                            > {
                                let obj = src.downcast_ref::<$name>().ok_or(
                                    $crate::Error::TypeMismatch {
                                        expected: ::core::any::type_name::<$name>(),
                                        context: "member read",
                                    },
                                )?;
                                ::core::result::Result::Ok(
                                    $crate::reflect::MemberValue::get_boxed(&obj.$field),
                                )
                            }
                            get as $crate::reflect::Getter
                        }),
                        setter: ::core::option::Option::Some({
                            fn set(
                                dst: &mut dyn ::core::any::Any,
                                value: ::core::option::Option<
                                    ::std::boxed::Box<dyn ::core::any::Any>,
                                >,
                            ) -> $crate::Result<()> {
                                let obj = dst.downcast_mut::<$name>().ok_or(
                                    $crate::Error::TypeMismatch {
                                        expected: ::core::any::type_name::<$name>(),
                                        context: "member write",
                                    },
                                )?;
                                obj.$field =
                                    <$fty as $crate::reflect::MemberValue>::from_boxed(value)?;
                                ::core::result::Result::Ok(())
                            }
                            set as $crate::reflect::Setter
                        }),
                        value_info: <$fty as $crate::reflect::MemberValue>::declared_info,
                    });
                )*

                $($(
                    {
                        let setter: ::core::option::Option<$crate::reflect::Setter> =
                            ::core::option::Option::None $( .or({
                                fn set(
                                    dst: &mut dyn ::core::any::Any,
                                    value: ::core::option::Option<
                                        ::std::boxed::Box<dyn ::core::any::Any>,
                                    >,
                                ) -> $crate::Result<()> {
                                    let obj = dst.downcast_mut::<$name>().ok_or(
                                        $crate::Error::TypeMismatch {
                                            expected: ::core::any::type_name::<$name>(),
                                            context: "property write",
                                        },
                                    )?;
                                    $pset(
                                        obj,
                                        <$pty as $crate::reflect::MemberValue>::from_boxed(value)?,
                                    );
                                    ::core::result::Result::Ok(())
                                }
                                ::core::option::Option::Some(set as $crate::reflect::Setter)
                            }) )?;

                        let value_info = <$pty as $crate::reflect::MemberValue>::declared_info;
                        let writable = setter.is_some()
                            || value_info().shape == $crate::reflect::TypeShape::Sequence;

                        members.push($crate::reflect::MemberInfo {
                            descriptor: $crate::reflect::MemberDescriptor {
                                name: stringify!($pname),
                                declaring_type: ::core::any::type_name::<$name>(),
                                kind: $crate::reflect::MemberKind::Property,
                                value_type: ::core::any::TypeId::of::<$pty>(),
                                value_type_name: ::core::any::type_name::<$pty>(),
                                readable: true,
                                writable,
                            },
                            getter: ::core::option::Option::Some({
                                fn get(
                                    src: &dyn ::core::any::Any,
                                ) -> $crate::Result<
                                    ::core::option::Option<
                                        ::std::boxed::Box<dyn ::core::any::Any>,
                                    >,
                                > {
                                    let obj = src.downcast_ref::<$name>().ok_or(
                                        $crate::Error::TypeMismatch {
                                            expected: ::core::any::type_name::<$name>(),
                                            context: "property read",
                                        },
                                    )?;
                                    let value: $pty = $pget(obj);
                                    ::core::result::Result::Ok(
                                        $crate::reflect::MemberValue::get_boxed(&value),
                                    )
                                }
                                get as $crate::reflect::Getter
                            }),
                            setter,
                            value_info,
                        });
                    }
                )*)?

                $($(
                    members.push($crate::reflect::MemberInfo {
                        descriptor: $crate::reflect::MemberDescriptor {
                            name: stringify!($mname),
                            declaring_type: ::core::any::type_name::<$name>(),
                            kind: $crate::reflect::MemberKind::Method,
                            value_type: ::core::any::TypeId::of::<$mty>(),
                            value_type_name: ::core::any::type_name::<$mty>(),
                            readable: true,
                            writable: false,
                        },
                        getter: ::core::option::Option::Some({
                            fn get(
                                src: &dyn ::core::any::Any,
                            ) -> $crate::Result<
                                ::core::option::Option<::std::boxed::Box<dyn ::core::any::Any>>,
                            > {
                                let obj = src.downcast_ref::<$name>().ok_or(
                                    $crate::Error::TypeMismatch {
                                        expected: ::core::any::type_name::<$name>(),
                                        context: "method read",
                                    },
                                )?;
                                let value: $mty = obj.$mname();
                                ::core::result::Result::Ok(
                                    $crate::reflect::MemberValue::get_boxed(&value),
                                )
                            }
                            get as $crate::reflect::Getter
                        }),
                        setter: ::core::option::Option::None,
                        value_info: <$mty as $crate::reflect::MemberValue>::declared_info,
                    });
                )*)?

                $crate::reflect::TypeInfo {
                    id: ::core::any::TypeId::of::<$name>(),
                    name: ::core::any::type_name::<$name>(),
                    shape: $crate::reflect::TypeShape::Struct,
                    is_value_type: false,
                    underlying: ::core::option::Option::None,
                    default_ctor: ::core::option::Option::Some({
                        fn ctor() -> ::std::boxed::Box<dyn ::core::any::Any> {
                            ::std::boxed::Box::new(<$name>::__reflect_default())
                        }
                        ctor as $crate::reflect::DefaultCtor
                    }),
                    clone_value: ::core::option::Option::Some(
                        $crate::reflect::clone_erased::<$name>,
                    ),
                    members: ::std::sync::Arc::new(members),
                    element: ::core::option::Option::None,
                    sequence: ::core::option::Option::None,
                }
            }
        }

        impl $crate::reflect::MemberValue for $name {
            fn get_boxed(
                &self,
            ) -> ::core::option::Option<::std::boxed::Box<dyn ::core::any::Any>> {
                ::core::option::Option::Some(::std::boxed::Box::new(
                    ::core::clone::Clone::clone(self),
                ))
            }

            fn from_boxed(
                value: ::core::option::Option<::std::boxed::Box<dyn ::core::any::Any>>,
            ) -> $crate::Result<Self> {
                match value {
                    ::core::option::Option::Some(v) => {
                        ::core::result::Result::Ok(*v.downcast::<$name>().map_err(|_| {
                            $crate::Error::TypeMismatch {
                                expected: ::core::any::type_name::<$name>(),
                                context: "member write",
                            }
                        })?)
                    }
                    ::core::option::Option::None => {
                        ::core::result::Result::Ok(<$name>::__reflect_default())
                    }
                }
            }

            fn declared_info() -> &'static $crate::reflect::TypeInfo {
                $crate::reflect::type_info_of::<$name>()
            }
        }
    };
}
