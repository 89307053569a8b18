use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Discriminates a user-held keypair identity from a program-derived one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccountTag {
    /// A user account: the 32-byte address is an Ed25519 public key.
    User = 0,
    /// A program account: the 32-byte address is a derived identity with no
    /// associated signing key. Authority over a program account is proven
    /// transitively through the call stack or via the program's own
    /// `authorize` entry point (see [`crate`] docs and the controller's
    /// authority check).
    Program = 1,
}

impl TryFrom<u8> for AccountTag {
    type Error = CommonError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AccountTag::User),
            1 => Ok(AccountTag::Program),
            _ => Err(CommonError::InvalidAccountTag(value)),
        }
    }
}

/// A 1-byte tag plus 32 bytes of key material, identifying either a user or
/// a program. Wire width is 33 bytes (§6).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account {
    pub tag: AccountTag,
    pub address: [u8; 32],
}

impl Account {
    pub const WIRE_LEN: usize = 33;

    /// The empty account, used as the outermost call frame's "caller".
    pub const EMPTY: Account = Account {
        tag: AccountTag::Program,
        address: [0u8; 32],
    };

    pub const fn user(address: [u8; 32]) -> Self {
        Account {
            tag: AccountTag::User,
            address,
        }
    }

    pub const fn program(address: [u8; 32]) -> Self {
        Account {
            tag: AccountTag::Program,
            address,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self.tag, AccountTag::User)
    }

    pub fn is_program(&self) -> bool {
        matches!(self.tag, AccountTag::Program)
    }

    pub fn is_empty(&self) -> bool {
        *self == Account::EMPTY
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Account({:?}, {})",
            self.tag,
            hex::encode(self.address)
        )
    }
}
