//! Element-wise activation functions

use mlkit_core::FloatElement;
use num_traits::Float;

/// What the forward stage keeps for the backward stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxSource {
    /// The forward input
    Input,
    /// The forward output
    Value,
}

/// An element-wise function and its derivative
///
/// The derivative is expressed in terms of the auxiliary value the forward
/// stage stores, which is either the input or the output as told by
/// [`AUX`](Activation::AUX).
pub trait Activation: Send + Sync + 'static {
    const NAME: &'static str;
    const AUX: AuxSource;

    fn value<T: FloatElement>(x: T) -> T;

    fn derivative<T: FloatElement>(aux: T) -> T;

    /// Name of the auxiliary tensor in error reports
    fn aux_name() -> &'static str {
        match Self::AUX {
            AuxSource::Input => "auxData",
            AuxSource::Value => "auxValue",
        }
    }
}

/// `|x|`
#[derive(Debug, Clone, Copy)]
pub struct Abs;

impl Activation for Abs {
    const NAME: &'static str = "abs";
    const AUX: AuxSource = AuxSource::Input;

    fn value<T: FloatElement>(x: T) -> T {
        Float::abs(x)
    }

    fn derivative<T: FloatElement>(x: T) -> T {
        if x > T::zero() {
            T::one()
        } else if x < T::zero() {
            -T::one()
        } else {
            T::zero()
        }
    }
}

/// `max(x, 0)`
#[derive(Debug, Clone, Copy)]
pub struct Relu;

impl Activation for Relu {
    const NAME: &'static str = "relu";
    const AUX: AuxSource = AuxSource::Input;

    fn value<T: FloatElement>(x: T) -> T {
        if x > T::zero() {
            x
        } else {
            T::zero()
        }
    }

    fn derivative<T: FloatElement>(x: T) -> T {
        if x > T::zero() {
            T::one()
        } else {
            T::zero()
        }
    }
}

/// `1 / (1 + e^-x)`
#[derive(Debug, Clone, Copy)]
pub struct Logistic;

fn sigmoid<T: FloatElement>(x: T) -> T {
    T::one() / (T::one() + Float::exp(-x))
}

impl Activation for Logistic {
    const NAME: &'static str = "logistic";
    const AUX: AuxSource = AuxSource::Value;

    fn value<T: FloatElement>(x: T) -> T {
        sigmoid(x)
    }

    fn derivative<T: FloatElement>(v: T) -> T {
        v * (T::one() - v)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tanh;

impl Activation for Tanh {
    const NAME: &'static str = "tanh";
    const AUX: AuxSource = AuxSource::Value;

    fn value<T: FloatElement>(x: T) -> T {
        Float::tanh(x)
    }

    fn derivative<T: FloatElement>(v: T) -> T {
        T::one() - v * v
    }
}

/// `ln(1 + e^x)`, the softplus function
#[derive(Debug, Clone, Copy)]
pub struct SmoothRelu;

impl Activation for SmoothRelu {
    const NAME: &'static str = "smoothrelu";
    const AUX: AuxSource = AuxSource::Input;

    fn value<T: FloatElement>(x: T) -> T {
        // max(x, 0) + ln(1 + e^-|x|) does not overflow for large x
        Float::max(x, T::zero()) + Float::ln_1p(Float::exp(-Float::abs(x)))
    }

    fn derivative<T: FloatElement>(x: T) -> T {
        sigmoid(x)
    }
}
