#![doc = include_str!("../README.md")]

pub mod patch;

pub use patch::{
    ConstructError, EnumerateError, InsertError, KeySlot, Keys, Patch, Ref, Side, VerifyError,
};
