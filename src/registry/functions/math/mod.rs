// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Numeric built-in functions

mod abs;
mod avg;
mod extremum;
mod round;
mod sum;

pub use abs::AbsFunction;
pub use avg::AvgFunction;
pub use extremum::ExtremumFunction;
pub use round::{
    DigitRoundFunction, MAX_PRECISION, RoundingMode, precision_argument, round_to_digits,
};
pub use sum::{SumFloatFunction, SumIntegerFunction};

use crate::registry::function::BuiltinRegistry;

/// Register all math functions
pub fn register_math_functions(registry: &mut BuiltinRegistry) {
    registry.register(AbsFunction);
    registry.register(AvgFunction);
    registry.register(DigitRoundFunction::round());
    registry.register(DigitRoundFunction::floor());
    registry.register(DigitRoundFunction::ceil());
    registry.register(ExtremumFunction::min());
    registry.register(ExtremumFunction::max());
    registry.register(SumIntegerFunction);
    registry.register(SumFloatFunction);
    registry.register_alias("$FLR", "$FLOOR");
}
