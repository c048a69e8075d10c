pub mod card;
pub mod citation;
pub mod input_gate;
pub mod normalize;
