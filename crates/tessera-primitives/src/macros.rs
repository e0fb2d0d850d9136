// One row per scalar kind:
// (kind, family, numeric, ordered, keyable, backend_native)
#[macro_export]
macro_rules! scalar_kind_table {
    ($macro:ident $(, @args $($args:tt)+ )?) => {
        $macro! {
            $( @args $($args)+; )?
            @rows
            (Blob,    Blob,       false, false, true,  true),
            (Bool,    Bool,       false, true,  false, true),
            (Date,    Temporal,   false, true,  false, false),
            (Float64, Numeric,    true,  true,  false, true),
            (Int,     Numeric,    true,  true,  true,  true),
            (Text,    Textual,    false, true,  true,  true),
            (Uint,    Numeric,    true,  true,  true,  true),
            (Ulid,    Identifier, false, true,  true,  false),
        }
    };
}

#[macro_export]
macro_rules! scalar_kind_registry {
    ($macro:ident) => {
        $crate::scalar_kind_table!($macro)
    };
    ($macro:ident, $($args:tt)+) => {
        $crate::scalar_kind_table!($macro, @args $($args)+)
    };
}

macro_rules! metadata_from_registry {
    ( @args $kind:expr; @rows $( ($scalar:ident, $family:ident, $numeric:expr, $ordered:expr, $keyable:expr, $native:expr) ),* $(,)? ) => {
        match $kind {
            $(
                $crate::ScalarKind::$scalar => $crate::ScalarMetadata {
                    family: $crate::ScalarFamily::$family,
                    is_numeric: $numeric,
                    supports_ordering: $ordered,
                    is_keyable: $keyable,
                    is_backend_native: $native,
                },
            )*
        }
    };
}

macro_rules! name_from_registry {
    ( @args $kind:expr; @rows $( ($scalar:ident, $($rest:tt)*) ),* $(,)? ) => {
        match $kind {
            $( $crate::ScalarKind::$scalar => stringify!($scalar), )*
        }
    };
}

macro_rules! all_kinds_from_registry {
    ( @rows $( ($scalar:ident, $($rest:tt)*) ),* $(,)? ) => {
        [ $( $crate::ScalarKind::$scalar ),* ]
    };
}
