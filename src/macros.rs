/// Implements [`Parameterized`](crate::layers::Parameterized) for a struct by visiting the
/// listed fields in order.
///
/// # Examples
///
/// ```
/// use a3c_nav::impl_parameterized;
/// use a3c_nav::layers::{Linear, Parameterized};
/// use a3c_nav::activations::Activation;
///
/// struct TwoLayers {
///     first: Linear,
///     second: Linear,
/// }
///
/// impl_parameterized!(TwoLayers { first, second });
///
/// let net = TwoLayers {
///     first: Linear::new(4, 8, Activation::Selu),
///     second: Linear::new(8, 2, Activation::Linear),
/// };
/// assert_eq!(net.num_parameters(), 4 * 8 + 8 + 8 * 2 + 2);
/// ```
///
/// The field order is the flat parameter order, so it must never change between a model
/// and the snapshots it loads.
#[macro_export]
macro_rules! impl_parameterized {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::layers::Parameterized for $ty {
            fn parameters(&self) -> Vec<$crate::ndarray::ArrayViewD<'_, f32>> {
                let mut params = Vec::new();
                $( params.extend($crate::layers::Parameterized::parameters(&self.$field)); )+
                params
            }

            fn parameters_mut(&mut self) -> Vec<$crate::ndarray::ArrayViewMutD<'_, f32>> {
                let mut params = Vec::new();
                $( params.extend($crate::layers::Parameterized::parameters_mut(&mut self.$field)); )+
                params
            }
        }
    };
}
