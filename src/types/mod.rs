pub mod address;
pub mod altered;
pub mod block;
pub mod numeric;
pub mod vector;

pub use address::Address;
pub use altered::{AlteredAccount, AlteredAccounts};
pub use numeric::Amount;
pub use vector::HexVecU8;
