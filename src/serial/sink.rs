//! Trait abstraction for the gauge byte sink to enable testing

use async_trait::async_trait;

use crate::error::Result;

/// Anything that accepts encoded gauge frames
///
/// The send loop writes one frame per cycle through this seam; the bundled
/// implementation is the serial port, tests use a recording mock.
#[async_trait]
pub trait FrameSink: Send {
    /// Transmit one complete frame
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::VaneBridgeError;
    use std::sync::{Arc, Mutex};

    /// Mock sink recording every transmitted frame
    #[derive(Clone)]
    pub struct MockFrameSink {
        pub sent_frames: Arc<Mutex<Vec<Vec<u8>>>>,
        pub fail_next: Arc<Mutex<bool>>,
    }

    impl MockFrameSink {
        pub fn new() -> Self {
            Self {
                sent_frames: Arc::new(Mutex::new(Vec::new())),
                fail_next: Arc::new(Mutex::new(false)),
            }
        }

        pub fn get_sent_frames(&self) -> Vec<Vec<u8>> {
            self.sent_frames.lock().unwrap().clone()
        }

        pub fn set_fail_next(&self) {
            *self.fail_next.lock().unwrap() = true;
        }
    }

    #[async_trait]
    impl FrameSink for MockFrameSink {
        async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(VaneBridgeError::Serial("mock send error".to_string()));
            }
            self.sent_frames.lock().unwrap().push(frame.to_vec());
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_records_frames() {
            let mut sink = MockFrameSink::new();
            sink.send_frame(&[0x01, 0x02, 0x80]).await.unwrap();

            let frames = sink.get_sent_frames();
            assert_eq!(frames, vec![vec![0x01, 0x02, 0x80]]);
        }

        #[tokio::test]
        async fn test_mock_send_error() {
            let mut sink = MockFrameSink::new();
            sink.set_fail_next();
            assert!(sink.send_frame(&[0x80]).await.is_err());
            assert!(sink.send_frame(&[0x80]).await.is_ok());
        }
    }
}
