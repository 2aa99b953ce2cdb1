// Byte-stream transport for a navigation worker.
//
// `serve` runs one `NavWorker` over any `Read`/`Write` pair using the
// protocol crate's length-delimited JSON frames, one reply frame per request
// frame, in order. The `city-nav-worker` binary uses it on stdin/stdout so a
// navigation domain can run in its own process.
//
// A frame that is not a valid `ToWorker` never ends the session: the length
// prefix has already been consumed, so the stream stays aligned. If the frame
// is a `FindPath` whose `request_id` is still readable, it is answered with a
// `PathError` so the caller is not left waiting; otherwise it is skipped with
// a warning. I/O errors and oversized frames end the session.

use std::io::{self, Read, Write};

use city_nav_protocol::{FrameError, FromWorker, RequestId, ToWorker, read_frame, send};
use serde_json::Value;
use tracing::{info, warn};

use crate::worker::NavWorker;

/// Serve requests until the input closes. Returns the number of requests
/// answered.
pub fn serve<R: Read, W: Write>(name: &str, mut reader: R, mut writer: W) -> Result<u64, FrameError> {
    let mut worker = NavWorker::new(name);
    let mut answered = 0u64;
    loop {
        let frame = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                info!(worker = name, answered, "input closed, stopping");
                return Ok(answered);
            }
            Err(e) => return Err(e.into()),
        };
        let reply = match serde_json::from_slice::<ToWorker>(&frame) {
            Ok(msg) => worker.handle(msg),
            Err(e) => match malformed_request_id(&frame) {
                Some(request_id) => {
                    warn!(worker = name, %request_id, error = %e, "malformed path request");
                    FromWorker::PathError {
                        request_id,
                        error: format!("Malformed request: {e}"),
                    }
                }
                None => {
                    warn!(worker = name, error = %e, "skipping undecodable frame");
                    continue;
                }
            },
        };
        send(&mut writer, &reply)?;
        answered += 1;
    }
}

/// The request id of a `FindPath` frame whose payload failed typed decoding.
fn malformed_request_id(frame: &[u8]) -> Option<RequestId> {
    let value: Value = serde_json::from_slice(frame).ok()?;
    value
        .get("FindPath")?
        .get("request_id")?
        .as_u64()
        .map(RequestId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_nav::{GridTransform, build_walkability_grid};
    use city_nav_protocol::{WirePoint, recv, write_frame};
    use std::io::Cursor;

    fn frames(msgs: &[ToWorker]) -> Vec<u8> {
        let mut buf = Vec::new();
        for msg in msgs {
            send(&mut buf, msg).unwrap();
        }
        buf
    }

    fn replies(mut bytes: &[u8]) -> Vec<FromWorker> {
        let mut out = Vec::new();
        while !bytes.is_empty() {
            out.push(recv(&mut bytes).unwrap());
        }
        out
    }

    #[test]
    fn serves_a_session_over_a_stream() {
        let matrix = vec![vec![true; 4]; 4];
        let data = build_walkability_grid(4, 4, &matrix, GridTransform::default()).unwrap();
        let input = frames(&[
            ToWorker::Init {
                navigation_data: data.to_bytes().unwrap(),
                config_json: "{}".into(),
            },
            ToWorker::FindPath {
                request_id: RequestId(1),
                start: Some(WirePoint::new(0.5, 0.0, 0.5)),
                end: Some(WirePoint::new(3.5, 0.0, 3.5)),
            },
        ]);
        let mut output = Vec::new();
        let answered = serve("stdio-test", Cursor::new(input), &mut output).unwrap();
        assert_eq!(answered, 2);

        let replies = replies(&output);
        assert_eq!(replies[0], FromWorker::InitComplete);
        match &replies[1] {
            FromWorker::PathResult {
                request_id,
                path: Some(points),
                ..
            } => {
                assert_eq!(*request_id, RequestId(1));
                assert_eq!(points.len(), 4);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn undecodable_frame_is_skipped() {
        let mut input = Vec::new();
        write_frame(&mut input, b"{\"Reticulate\":{}}").unwrap();
        send(
            &mut input,
            &ToWorker::FindPath {
                request_id: RequestId(2),
                start: None,
                end: None,
            },
        )
        .unwrap();
        let mut output = Vec::new();
        assert_eq!(serve("stdio-test", Cursor::new(input), &mut output).unwrap(), 1);
        assert!(matches!(
            replies(&output)[0],
            FromWorker::PathError { request_id: RequestId(2), .. }
        ));
    }

    #[test]
    fn malformed_path_request_gets_a_path_error() {
        let mut input = Vec::new();
        write_frame(
            &mut input,
            br#"{"FindPath":{"request_id":5,"start":{"x":1.0},"end":{"x":2.0,"y":0.0,"z":2.0}}}"#,
        )
        .unwrap();
        // No recoverable id: skipped without a reply.
        write_frame(&mut input, br#"{"FindPath":{"start":null}}"#).unwrap();
        send(
            &mut input,
            &ToWorker::FindPath {
                request_id: RequestId(6),
                start: None,
                end: None,
            },
        )
        .unwrap();
        let mut output = Vec::new();
        assert_eq!(serve("stdio-test", Cursor::new(input), &mut output).unwrap(), 2);
        let replies = replies(&output);
        assert!(matches!(
            &replies[0],
            FromWorker::PathError { request_id: RequestId(5), error } if error.starts_with("Malformed request")
        ));
        assert!(matches!(
            replies[1],
            FromWorker::PathError { request_id: RequestId(6), .. }
        ));
    }

    #[test]
    fn truncated_frame_ends_the_session() {
        let mut input = frames(&[ToWorker::FindPath {
            request_id: RequestId(3),
            start: None,
            end: None,
        }]);
        input.truncate(input.len() - 2);
        let mut output = Vec::new();
        // A short read inside a frame is reported as EOF, which ends cleanly.
        assert_eq!(serve("stdio-test", Cursor::new(input), &mut output).unwrap(), 0);
        assert!(output.is_empty());
    }
}
