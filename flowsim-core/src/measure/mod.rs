mod flow;
mod ratio;

pub use self::{
    flow::Flow,
    ratio::{Ratio, RatioError, RatioParseError},
};
