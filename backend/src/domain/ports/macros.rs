//! `define_port_error!` generates a port error enum with `thiserror`
//! messages and one snake_case constructor per variant.
//!
//! Every variant carries named fields; each constructor takes the fields in
//! declaration order as `impl Into<FieldType>`.

macro_rules! define_port_error {
    (@constructor $variant:ident [$($params:tt)*] [$($inits:tt)*]) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (
        @constructor $variant:ident [$($params:tt)*] [$($inits:tt)*]
        $field:ident : $ty:ty $(, $($rest:tt)*)?
    ) => {
        define_port_error!(
            @constructor $variant
            [$($params)* $field: impl Into<$ty>,]
            [$($inits)* $field: $field.into(),]
            $($($rest)*)?
        );
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),+ $(,)? } => $message:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $($field : $ty),+ },
            )+
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant [] [] $($field : $ty),+);
            )+
        }
    };
}

pub(crate) use define_port_error;
