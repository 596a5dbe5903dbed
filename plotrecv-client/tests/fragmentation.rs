//! However the transport splits the byte stream, the same files come out.

use plotrecv_client::{FrameReceiver, ReceiverConfig, Termination};
use plotrecv_protocol::encode_frame;
use proptest::prelude::*;
use tempfile::TempDir;
use tokio_test::io::Builder;

/// Splits `bytes` at the given (unsorted, possibly duplicate) cut points.
fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    cuts.push(0);
    cuts.push(bytes.len());
    cuts.sort_unstable();
    cuts.dedup();
    cuts.windows(2)
        .map(|w| bytes[w[0]..w[1]].to_vec())
        .collect()
}

fn receive(deliveries: &[Vec<u8>], chunk_size: usize) -> (TempDir, plotrecv_client::ReceiveReport) {
    let tmp = TempDir::new().unwrap();
    let mut builder = Builder::new();
    for delivery in deliveries {
        builder.read(delivery);
    }
    let stream = builder.build();
    let config = ReceiverConfig::default().with_read_chunk_size(chunk_size);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let report = rt
        .block_on(FrameReceiver::new(stream, config).receive_all(tmp.path()))
        .unwrap();
    (tmp, report)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fragmentation_does_not_change_output(
        payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..300), 1..6),
        cuts in proptest::collection::vec(any::<usize>(), 0..40),
        chunk_size in 1usize..64,
    ) {
        let mut stream = Vec::new();
        for payload in &payloads {
            stream.extend_from_slice(&encode_frame(payload).unwrap());
        }

        let deliveries = split_at_cuts(&stream, &cuts);
        let (tmp, report) = receive(&deliveries, chunk_size);

        prop_assert_eq!(report.termination, Termination::EndOfStream);
        prop_assert_eq!(report.frames_saved, payloads.len() as u64);
        for (i, payload) in payloads.iter().enumerate() {
            let path = tmp.path().join(format!("plot_{:04}.png", i));
            prop_assert_eq!(&std::fs::read(&path).unwrap(), payload);
        }
    }

    #[test]
    fn prop_truncated_stream_never_writes_partial_frame(
        payload in proptest::collection::vec(any::<u8>(), 1..300),
        keep in any::<usize>(),
    ) {
        let stream = encode_frame(&payload).unwrap().to_vec();
        // Keep at least one byte and drop at least one byte.
        let keep = 1 + keep % (stream.len() - 1);

        let (tmp, report) = receive(&[stream[..keep].to_vec()], 8192);

        prop_assert!(!report.termination.is_clean());
        prop_assert_eq!(report.frames_saved, 0);
        prop_assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}

#[test]
fn test_split_at_cuts_covers_input() {
    let parts = split_at_cuts(b"abcdef", &[2, 2, 4, 100]);
    let joined: Vec<u8> = parts.concat();
    assert_eq!(joined, b"abcdef");
    assert!(parts.iter().all(|p| !p.is_empty()));
}
