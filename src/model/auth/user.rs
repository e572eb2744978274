use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// A class of user, determining which tokens a route accepts.
pub trait User {
    /// Does a token with these rights represent this kind of user?
    fn permits(rights: Rights) -> bool;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

/// An election organizer.
pub struct Admin;

impl User for Admin {
    fn permits(rights: Rights) -> bool {
        rights == Rights::Admin
    }
}

/// An already-authenticated voter, identified by the token subject.
pub struct Voter;

impl User for Voter {
    fn permits(rights: Rights) -> bool {
        rights == Rights::Voter
    }
}

