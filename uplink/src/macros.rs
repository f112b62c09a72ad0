//! Constructor macros for [`crate::error::UplinkError`].

/// Creates an [`crate::error::UplinkError`] from an error kind and a static description.
///
/// A dynamic detail string can be attached with `detail = <expr>` (the expression is
/// moved into the error) and an originating error with `source: <expr>`. The callsite
/// location is captured automatically.
#[macro_export]
macro_rules! uplink_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::UplinkError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::UplinkError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::UplinkError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::UplinkError::from(($kind, $desc, $detail)).with_source($source)
    };
}

/// Returns early with an [`crate::error::UplinkError`] built by [`uplink_error!`].
///
/// Accepts the same arguments as [`uplink_error!`].
#[macro_export]
macro_rules! bail {
    ($($args:tt)*) => {
        return ::core::result::Result::Err($crate::uplink_error!($($args)*))
    };
}
