//! Conntrack and expectation message decoding.
//!
//! Decoding is all-or-nothing: the first malformed attribute aborts the
//! call and the partially populated object is dropped.

use tracing::trace;

use crate::attr::{AttrCursor, RawAttr, NETATTR_SIZ};
use crate::error::{DecodeError, Result};
use crate::header::{NetHeader, NETHDR_SIZ};
use crate::object::{Conntrack, ConntrackObject, ExpTuple, Expectation, ExpectationObject};
use crate::table::{CtRule, ExpRule, CT_TABLE, EXP_TABLE};

/// Decode a conntrack message into the in-crate [`Conntrack`].
pub fn decode_conntrack(msg: &[u8]) -> Result<Conntrack> {
    decode_conntrack_as(msg)
}

/// Decode an expectation message into the in-crate [`Expectation`].
pub fn decode_expectation(msg: &[u8]) -> Result<Expectation> {
    decode_expectation_as(msg)
}

/// Decode a conntrack message into any [`ConntrackObject`].
///
/// `msg` starts at the message header; its length is the number of bytes
/// the caller actually holds.
pub fn decode_conntrack_as<C: ConntrackObject>(msg: &[u8]) -> Result<C> {
    let region = attr_region(msg)?;
    let mut ct = C::try_new().ok_or(DecodeError::AllocationFailure {
        object: "conntrack",
    })?;

    for attr in AttrCursor::new(region) {
        let attr = attr?;
        let entry = lookup(&CT_TABLE, attr.id)?;
        check_size(&attr, entry.size)?;
        if entry.rule == CtRule::Reserved {
            trace!(id = attr.id, len = attr.len, "skipping reserved attribute");
            continue;
        }
        entry.rule.apply(&mut ct, attr.payload);
    }

    Ok(ct)
}

/// Decode an expectation message into any [`ExpectationObject`].
///
/// The master, expected and mask tuples are built in scratch objects and
/// attached by copy once the whole message has validated. Each tuple
/// attribute is written to exactly one of them.
pub fn decode_expectation_as<E: ExpectationObject>(msg: &[u8]) -> Result<E> {
    let region = attr_region(msg)?;
    let mut exp = E::try_new().ok_or(DecodeError::AllocationFailure {
        object: "expectation",
    })?;

    // Scratch tuples drop in reverse allocation order on every return path.
    let mut master = new_tuple::<E::Tuple>("master")?;
    let mut expected = new_tuple::<E::Tuple>("expected")?;
    let mut mask = new_tuple::<E::Tuple>("mask")?;

    for attr in AttrCursor::new(region) {
        let attr = attr?;
        let entry = lookup(&EXP_TABLE, attr.id)?;
        check_size(&attr, entry.size)?;
        match entry.rule {
            ExpRule::Reserved => {
                trace!(id = attr.id, len = attr.len, "skipping reserved attribute");
            }
            ExpRule::Tuple { tuple, field } => {
                let dst = match tuple {
                    ExpTuple::Master => &mut master,
                    ExpTuple::Expected => &mut expected,
                    ExpTuple::Mask => &mut mask,
                };
                field.apply(dst, attr.payload);
            }
            ExpRule::U32(target) => target.apply(&mut exp, attr.payload),
        }
    }

    exp.set_tuple(ExpTuple::Master, &master);
    exp.set_tuple(ExpTuple::Expected, &expected);
    exp.set_tuple(ExpTuple::Mask, &mask);

    Ok(exp)
}

/// Validate the header against the bytes held and return the attribute region.
fn attr_region(msg: &[u8]) -> Result<&[u8]> {
    let header = NetHeader::parse(msg)?;
    let total = header.total_len();
    if total < NETHDR_SIZ {
        return Err(DecodeError::InvalidLength {
            len: total,
            min: NETHDR_SIZ,
        });
    }
    if msg.len() < total {
        return Err(DecodeError::Truncated {
            needed: total,
            available: msg.len(),
        });
    }
    Ok(&msg[NETHDR_SIZ..total])
}

fn lookup<T: Copy>(table: &[T], id: u16) -> Result<T> {
    table
        .get(usize::from(id))
        .copied()
        .ok_or(DecodeError::UnknownAttribute {
            id,
            max: table.len(),
        })
}

fn check_size(attr: &RawAttr<'_>, size: Option<usize>) -> Result<()> {
    match size {
        Some(expected) if attr.len != expected => Err(DecodeError::SizeMismatch {
            id: attr.id,
            expected,
            actual: attr.len,
        }),
        None if attr.len < NETATTR_SIZ => Err(DecodeError::AttributeTooShort {
            id: attr.id,
            len: attr.len,
        }),
        _ => Ok(()),
    }
}

fn new_tuple<C: ConntrackObject>(object: &'static str) -> Result<C> {
    C::try_new().ok_or(DecodeError::AllocationFailure { object })
}
