use std::fs;

use ctsync_wire::split_messages;

use crate::cmd::DecodeArgs;
use crate::exit::{decode_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};
use crate::view::MessageView;

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let data = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let views = decode_all(&data)?;
    for view in &views {
        print_message(view, format);
    }
    Ok(SUCCESS)
}

/// Decode every message in `data`, failing on the first bad one.
fn decode_all(data: &[u8]) -> CliResult<Vec<MessageView>> {
    let mut messages = split_messages(data);
    let mut views = Vec::new();
    for (index, msg) in messages.by_ref().enumerate() {
        let msg = msg.map_err(|err| decode_error(&format!("message {index}"), err))?;
        let view =
            MessageView::decode(msg).map_err(|err| decode_error(&format!("message {index}"), err))?;
        views.push(view);
    }

    let trailing = messages.remainder().len();
    if trailing > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{trailing} trailing bytes do not form a complete message"),
        ));
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    const L4PROTO_TCP: [u8; 16] = [
        0x10, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, //
        0x00, 0x05, 0x00, 0x02, 0x06, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn decodes_back_to_back_messages() {
        let mut data = L4PROTO_TCP.to_vec();
        data.extend_from_slice(&L4PROTO_TCP);
        let views = decode_all(&data).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].fields["l4proto"], "6");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut data = L4PROTO_TCP.to_vec();
        data.extend_from_slice(&[0x10, 0x00]);
        let err = decode_all(&data).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("2 trailing bytes"));
    }

    #[test]
    fn bad_message_names_its_position() {
        let mut bad = L4PROTO_TCP;
        bad[9] = 0x06;
        let mut data = L4PROTO_TCP.to_vec();
        data.extend_from_slice(&bad);
        let err = decode_all(&data).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("message 1: "));
    }
}
