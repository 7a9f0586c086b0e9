//! Typed positional arguments.

use chronicle_events::{decode_arg, type_display_name, EventError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A tuple of handler parameters decoded from an event's positional
/// arguments.
///
/// Implemented for tuples of up to four `serde` types, with `()` for
/// handlers that take nothing.
pub trait Arguments: Sized + Send + 'static {
    /// Number of positional arguments.
    const ARITY: usize;

    /// Display names of the parameter types, in order.
    fn type_names() -> Vec<String>;

    /// Decodes the tuple. `args.len()` must equal [`Self::ARITY`].
    fn from_values(args: &[Value]) -> Result<Self, EventError>;

    /// Re-encodes the tuple as positional values.
    fn to_values(&self) -> Result<Vec<Value>, EventError>;
}

macro_rules! impl_arguments {
    ($arity:expr; $($ty:ident : $idx:tt),*) => {
        impl<$($ty),*> Arguments for ($($ty,)*)
        where
            $($ty: Serialize + DeserializeOwned + Send + 'static,)*
        {
            const ARITY: usize = $arity;

            fn type_names() -> Vec<String> {
                vec![$(type_display_name::<$ty>()),*]
            }

            fn from_values(args: &[Value]) -> Result<Self, EventError> {
                if args.len() != $arity {
                    return Err(EventError::ArgumentOutOfRange {
                        index: $arity,
                        len: args.len(),
                    });
                }
                Ok(($(decode_arg::<$ty>($idx, &args[$idx])?,)*))
            }

            fn to_values(&self) -> Result<Vec<Value>, EventError> {
                Ok(vec![$(serde_json::to_value(&self.$idx)?),*])
            }
        }
    };
}

impl_arguments!(0;);
impl_arguments!(1; A: 0);
impl_arguments!(2; A: 0, B: 1);
impl_arguments!(3; A: 0, B: 1, C: 2);
impl_arguments!(4; A: 0, B: 1, C: 2, D: 3);
