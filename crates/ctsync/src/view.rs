//! Flattening decoded messages into printable field lists.

use std::collections::BTreeMap;

use ctsync_wire::header::{F_ACK, F_ALIVE, F_HELLO, F_HELLO_BACK, F_NACK, F_RESYNC};
use ctsync_wire::{
    decode_conntrack, decode_expectation, AckRange, Conntrack, CtGroup, DecodeError, ExpAttr,
    ExpTuple, MsgType, NetHeader,
};
use serde::Serialize;

const FLAG_NAMES: [(u8, &str); 6] = [
    (F_RESYNC, "resync"),
    (F_NACK, "nack"),
    (F_ACK, "ack"),
    (F_ALIVE, "alive"),
    (F_HELLO, "hello"),
    (F_HELLO_BACK, "hello-back"),
];

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub kind: String,
    pub seq: u32,
    pub flags: Vec<&'static str>,
    pub len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<usize>,
    pub fields: BTreeMap<String, String>,
}

impl MessageView {
    /// Decode `msg`, which must hold exactly one message.
    pub fn decode(msg: &[u8]) -> Result<Self, DecodeError> {
        let header = NetHeader::parse(msg)?;
        let mut fields = BTreeMap::new();

        let kind = match header.kind() {
            Some(kind) if kind.is_conntrack() => {
                conntrack_fields(&decode_conntrack(msg)?, "", &mut fields);
                kind.name().to_string()
            }
            Some(kind) if kind.is_expectation() => {
                let exp = decode_expectation(msg)?;
                for which in [ExpTuple::Master, ExpTuple::Expected, ExpTuple::Mask] {
                    if let Some(tuple) = exp.tuple(which) {
                        conntrack_fields(tuple, &format!("{}.", which.name()), &mut fields);
                    }
                }
                if let Some(timeout) = exp.get_u32(ExpAttr::Timeout) {
                    fields.insert("timeout".to_string(), timeout.to_string());
                }
                if let Some(flags) = exp.get_u32(ExpAttr::Flags) {
                    fields.insert("flags".to_string(), format!("{flags:#x}"));
                }
                kind.name().to_string()
            }
            Some(MsgType::Control) => {
                if header.has_flag(F_ACK) || header.has_flag(F_NACK) {
                    let range = AckRange::parse(msg)?;
                    fields.insert("from".to_string(), range.from.to_string());
                    fields.insert("to".to_string(), range.to.to_string());
                }
                MsgType::Control.name().to_string()
            }
            _ => format!("unknown-{}", header.msg_type),
        };

        Ok(Self {
            kind,
            seq: header.seq,
            flags: flag_names(header.flags),
            len: header.total_len(),
            channel: None,
            fields,
        })
    }

    pub fn with_channel(mut self, index: usize) -> Self {
        self.channel = Some(index);
        self
    }
}

fn flag_names(flags: u8) -> Vec<&'static str> {
    FLAG_NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

fn conntrack_fields(ct: &Conntrack, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (attr, value) in ct.attrs() {
        out.insert(format!("{prefix}{}", attr.name()), value.as_u32().to_string());
    }
    for (group, _) in ct.groups() {
        let rendered = match group {
            CtGroup::OrigIpv4 | CtGroup::MasterIpv4 => {
                ct.ipv4_pair(group).map(|(src, dst)| format!("{src} -> {dst}"))
            }
            CtGroup::OrigIpv6 | CtGroup::MasterIpv6 => {
                ct.ipv6_pair(group).map(|(src, dst)| format!("{src} -> {dst}"))
            }
            CtGroup::OrigPort | CtGroup::MasterPort => {
                ct.port_pair(group).map(|(src, dst)| format!("{src} -> {dst}"))
            }
        };
        if let Some(rendered) = rendered {
            out.insert(format!("{prefix}{}", group.name()), rendered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use bytes::BytesMut;
    use ctsync_wire::{
        encode_conntrack, encode_expectation, ConntrackObject, CtAttr, Expectation,
        ExpectationObject, NETHDR_ACK_SIZ,
    };

    #[test]
    fn conntrack_fields_are_named() {
        let mut ct = Conntrack::new();
        ct.set_u8(CtAttr::L4Proto, 6);
        ct.set_u32(CtAttr::Mark, 0x10);
        ct.set_ipv4_pair(
            CtGroup::OrigIpv4,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        ct.set_port_pair(CtGroup::OrigPort, 40000, 80);
        let msg = encode_conntrack(&ct, NetHeader::new(MsgType::CtUpdate, F_RESYNC, 9)).unwrap();

        let view = MessageView::decode(&msg).unwrap();
        assert_eq!(view.kind, "ct-update");
        assert_eq!(view.seq, 9);
        assert_eq!(view.flags, vec!["resync"]);
        assert_eq!(view.fields["l4proto"], "6");
        assert_eq!(view.fields["mark"], "16");
        assert_eq!(view.fields["orig-ipv4"], "10.0.0.1 -> 10.0.0.2");
        assert_eq!(view.fields["orig-port"], "40000 -> 80");
    }

    #[test]
    fn expectation_fields_are_prefixed_by_tuple() {
        let mut master = Conntrack::new();
        master.set_u8(CtAttr::L4Proto, 17);
        let mut exp = Expectation::new();
        exp.set_tuple(ExpTuple::Master, &master);
        exp.set_u32(ExpAttr::Timeout, 30);
        let msg = encode_expectation(&exp, NetHeader::new(MsgType::ExpNew, 0, 1)).unwrap();

        let view = MessageView::decode(&msg).unwrap();
        assert_eq!(view.kind, "exp-new");
        assert_eq!(view.fields["master.l4proto"], "17");
        assert_eq!(view.fields["timeout"], "30");
        assert!(!view.fields.keys().any(|k| k.starts_with("mask.")));
    }

    #[test]
    fn ack_range_is_reported() {
        let mut buf = BytesMut::new();
        let mut header = NetHeader::new(MsgType::Control, F_ACK, 5);
        header.len = NETHDR_ACK_SIZ as u16;
        header.write(&mut buf);
        AckRange { from: 3, to: 7 }.write(&mut buf);

        let view = MessageView::decode(&buf).unwrap().with_channel(2);
        assert_eq!(view.kind, "control");
        assert_eq!(view.flags, vec!["ack"]);
        assert_eq!(view.fields["from"], "3");
        assert_eq!(view.fields["to"], "7");
        assert_eq!(view.channel, Some(2));
    }

    #[test]
    fn malformed_message_is_an_error() {
        let msg = [
            0x10, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, // header, len 16
            0x00, 0x06, 0x00, 0x02, 0x06, 0x00, 0x00, 0x00, // l4proto with len 6
        ];
        assert!(matches!(
            MessageView::decode(&msg),
            Err(DecodeError::SizeMismatch { id: 2, .. })
        ));
    }
}
