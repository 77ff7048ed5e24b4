//! Callable bindings
//!
//! Every registry entry is an [`Handler`]: something invocable with the
//! positional params of a request that produces a MessagePack value or a
//! [`RemoteError`]. Plain Rust closures become handlers through
//! [`IntoHandler`], which records the closure's parameter count as its
//! [`Arity`] and decodes each argument with serde.

use msgrpc_common::{Params, RemoteError, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;

/// Number of positional params a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many params.
    Exact(usize),
    /// Any number of params; the handler validates them itself.
    Variadic,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => *n == count,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(1) => write!(f, "1 argument"),
            Arity::Exact(n) => write!(f, "{} arguments", n),
            Arity::Variadic => write!(f, "any number of arguments"),
        }
    }
}

/// A bound callable, as seen by the dispatcher.
///
/// Handlers are invoked on tokio's blocking pool and may be called from
/// several connections at once.
pub trait Handler: Send + Sync + 'static {
    fn arity(&self) -> Arity;

    /// Invokes the handler. `params.len()` has already been checked against
    /// [`Handler::arity`].
    fn call(&self, params: Params) -> Result<Value, RemoteError>;
}

/// Conversion of a Rust function or closure into a typed handler.
///
/// Implemented for `Fn` closures of up to eight arguments where every
/// argument is `DeserializeOwned`. `Args` is the tuple of argument types and
/// only exists to keep the impls apart.
///
/// ```
/// use msgrpc_server::handler::IntoHandler;
///
/// fn arity<Args, F: IntoHandler<Args>>(_: &F) -> usize {
///     F::ARITY
/// }
///
/// assert_eq!(arity(&|a: i64, b: i64| a + b), 2);
/// assert_eq!(arity(&|| "pong"), 0);
/// ```
pub trait IntoHandler<Args>: Send + Sync + 'static {
    type Output;

    const ARITY: usize;

    /// Decodes `params` and calls the function.
    fn invoke(&self, params: Params) -> Result<Self::Output, RemoteError>;
}

fn decode_arg<T: DeserializeOwned>(param: Option<(usize, Value)>) -> Result<T, RemoteError> {
    let (index, value) =
        param.ok_or_else(|| RemoteError::argument_mismatch("missing positional argument"))?;

    rmpv::ext::from_value(value).map_err(|e| {
        RemoteError::argument_mismatch(format!(
            "argument {} could not be converted to {}: {}",
            index,
            std::any::type_name::<T>(),
            e
        ))
    })
}

fn encode_result<T: Serialize>(value: T) -> Result<Value, RemoteError> {
    msgrpc_common::to_value(value).map_err(|e| RemoteError::execution(e.to_string()))
}

macro_rules! impl_into_handler {
    ($count:expr; $($arg:ident),*) => {
        impl<F, R, $($arg,)*> IntoHandler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            $($arg: DeserializeOwned,)*
        {
            type Output = R;

            const ARITY: usize = $count;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, params: Params) -> Result<R, RemoteError> {
                let mut params = params.into_iter().enumerate();
                $(
                    let $arg = decode_arg::<$arg>(params.next())?;
                )*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_into_handler!(0;);
impl_into_handler!(1; A1);
impl_into_handler!(2; A1, A2);
impl_into_handler!(3; A1, A2, A3);
impl_into_handler!(4; A1, A2, A3, A4);
impl_into_handler!(5; A1, A2, A3, A4, A5);
impl_into_handler!(6; A1, A2, A3, A4, A5, A6);
impl_into_handler!(7; A1, A2, A3, A4, A5, A6, A7);
impl_into_handler!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// Handler around a function whose return value is always a success.
pub struct TypedHandler<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> TypedHandler<F, Args> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _args: PhantomData,
        }
    }
}

impl<F, Args> Handler for TypedHandler<F, Args>
where
    F: IntoHandler<Args>,
    F::Output: Serialize,
    Args: 'static,
{
    fn arity(&self) -> Arity {
        Arity::Exact(F::ARITY)
    }

    fn call(&self, params: Params) -> Result<Value, RemoteError> {
        encode_result(self.f.invoke(params)?)
    }
}

/// Handler around a function returning `Result<T, E>`.
///
/// An `Err` becomes a `RemoteExecutionFailure` whose message is the error's
/// display text and whose trace lists the error's sources followed by the
/// location the handler was bound at.
pub struct FallibleHandler<F, Args> {
    f: F,
    origin: &'static Location<'static>,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> FallibleHandler<F, Args> {
    pub fn new(f: F, origin: &'static Location<'static>) -> Self {
        Self {
            f,
            origin,
            _args: PhantomData,
        }
    }
}

impl<F, Args, T, E> Handler for FallibleHandler<F, Args>
where
    F: IntoHandler<Args, Output = Result<T, E>>,
    T: Serialize,
    E: Into<anyhow::Error>,
    Args: 'static,
{
    fn arity(&self) -> Arity {
        Arity::Exact(F::ARITY)
    }

    fn call(&self, params: Params) -> Result<Value, RemoteError> {
        match self.f.invoke(params)? {
            Ok(value) => encode_result(value),
            Err(err) => {
                let err: anyhow::Error = err.into();
                let trace = err
                    .chain()
                    .skip(1)
                    .map(|cause| format!("caused by: {}", cause))
                    .chain(std::iter::once(format!(
                        "in handler bound at {}:{}",
                        self.origin.file(),
                        self.origin.line()
                    )));
                Err(RemoteError::execution(err.to_string()).with_trace(trace))
            }
        }
    }
}

/// Handler over raw params with an explicitly declared arity.
pub struct RawHandler<F> {
    f: F,
    arity: Arity,
}

impl<F> RawHandler<F> {
    pub fn new(arity: Arity, f: F) -> Self {
        Self { f, arity }
    }
}

impl<F> Handler for RawHandler<F>
where
    F: Fn(Params) -> Result<Value, RemoteError> + Send + Sync + 'static,
{
    fn arity(&self) -> Arity {
        self.arity
    }

    fn call(&self, params: Params) -> Result<Value, RemoteError> {
        (self.f)(params)
    }
}
