pub mod pin;

pub use pin::{
    PinData,
    read_pin,
    read_pin_file,
};
