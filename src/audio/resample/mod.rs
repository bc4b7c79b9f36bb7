pub mod linear;

pub use linear::LinearResampler;
