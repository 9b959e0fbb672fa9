#![no_main]

use arbitrary::Arbitrary;
use jsonsluice::{Charset, ConverterOptions, ElementSession, PipelineMode, Value};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    /// Chunk lengths used to split `body`; zero entries are skipped.
    splits: Vec<u8>,
    streaming: bool,
    body: &'a [u8],
}

fn run(input: &Input<'_>, mode: PipelineMode) -> Option<Vec<Value>> {
    let mut session = ElementSession::new(mode, Charset::Utf8, &ConverterOptions::default());
    let mut rest = input.body;
    for &len in &input.splits {
        if rest.is_empty() {
            break;
        }
        if len == 0 {
            continue;
        }
        let (head, tail) = rest.split_at(usize::from(len).min(rest.len()));
        session.feed(head);
        rest = tail;
    }
    session.feed(rest);
    session.finish();
    core::iter::from_fn(|| session.next_item())
        .collect::<Result<Vec<_>, _>>()
        .ok()
}

fuzz_target!(|input: Input<'_>| {
    // serde_json rejects a byte order mark that the decoder skips
    if input.body.starts_with(b"\xEF\xBB\xBF") {
        return;
    }
    let reference = match serde_json::from_slice::<serde_json::Value>(input.body) {
        Ok(value) => Some(value),
        // nesting the pipeline allows but serde_json does not
        Err(err) if err.to_string().contains("recursion limit") => return,
        Err(_) => None,
    };

    if input.streaming {
        let elements = run(&input, PipelineMode::Elements);
        match (&reference, elements) {
            (Some(serde_json::Value::Array(expected)), Some(got)) => {
                let got: Vec<serde_json::Value> = got.into_iter().map(serde_json::Value::from).collect();
                assert_eq!(&got, expected);
            }
            (Some(serde_json::Value::Array(_)), None) => panic!("pipeline rejected a valid array"),
            (_, Some(_)) => panic!("pipeline accepted a body serde_json rejects or that is not an array"),
            (_, None) => {}
        }
    } else {
        let value = run(&input, PipelineMode::Scalar).map(|mut values| {
            assert_eq!(values.len(), 1);
            serde_json::Value::from(values.remove(0))
        });
        assert_eq!(value, reference);
    }
});
