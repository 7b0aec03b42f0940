//! Conversation (endpoint pair) keys.
//!
//! A signalling association is identified by its two network addresses,
//! independent of which side sent the current message. Requests and replies
//! swap source and destination, so the pair is stored lower address first.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use compact_str::CompactString;

/// A network address as seen by the host for one side of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IPv4 or IPv6 address.
    Ip(IpAddr),
    /// SS7 signalling point code (H.248 and ALCAP over M3UA or MTP3).
    PointCode(u32),
    /// Any other address family, in its display form.
    Other(CompactString),
}

impl Address {
    /// Total-order key over address family and address bytes.
    ///
    /// Unknown families degrade to a hash of their display form, which is
    /// stable within a process but may collide.
    fn order_key(&self) -> EndpointKey {
        match self {
            Address::PointCode(pc) => EndpointKey::PointCode(*pc),
            Address::Ip(ip) => EndpointKey::Ip(*ip),
            Address::Other(text) => {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                EndpointKey::Hashed(hasher.finish())
            }
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Address::Ip(ip)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(ip) => write!(f, "{ip}"),
            Address::PointCode(pc) => write!(f, "pc:{pc}"),
            Address::Other(text) => f.write_str(text),
        }
    }
}

/// One canonicalized endpoint. Variant order is the family order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKey {
    PointCode(u32),
    Ip(IpAddr),
    Hashed(u64),
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKey::PointCode(pc) => write!(f, "pc:{pc}"),
            EndpointKey::Ip(ip) => write!(f, "{ip}"),
            EndpointKey::Hashed(h) => write!(f, "#{h:016x}"),
        }
    }
}

/// Normalized conversation key (lower endpoint first for consistent lookup).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ConversationKey {
    lo: EndpointKey,
    hi: EndpointKey,
}

impl ConversationKey {
    /// Create a normalized conversation key.
    /// Ensures lo <= hi regardless of message direction.
    pub fn new(src: &Address, dst: &Address) -> Self {
        let a = src.order_key();
        let b = dst.order_key();
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    pub fn lo(&self) -> EndpointKey {
        self.lo
    }

    pub fn hi(&self) -> EndpointKey {
        self.hi
    }

    /// True if `src` is the lower endpoint of the pair.
    pub fn is_from_lo(&self, src: &Address) -> bool {
        src.order_key() == self.lo
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.lo, self.hi)
    }
}
