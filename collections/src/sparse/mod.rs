mod inner;
mod ring;

pub use ring::Ring;
