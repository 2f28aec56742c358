//! Utility macros for reducing boilerplate

/// Implement `FromRef<AppState>` so a handler can take one field of the
/// shared state as `State<T>`.
///
/// # Example
/// ```ignore
/// impl_from_ref!(Arc<ObjectService>, objects);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for Arc<ObjectService> {
///     fn from_ref(state: &AppState) -> Self {
///         state.objects.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
