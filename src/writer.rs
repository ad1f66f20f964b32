use crate::{Emitter, Encoding, WriterError};

impl Emitter<'_> {
    /// Flush the accumulated characters to the output in the stream
    /// encoding.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        assert!(self.write_handler.is_some(), "no output handler set");
        assert_ne!(self.encoding, Encoding::Any, "encoding was not resolved");

        if self.buffer.is_empty() {
            return Ok(());
        }

        if self.encoding == Encoding::Utf8 {
            let to_emit = self.buffer.as_bytes();
            self.write_handler
                .as_mut()
                .expect("non-null writer")
                .write_all(to_emit)?;
            self.buffer.clear();
            return Ok(());
        }

        match self.encoding {
            Encoding::Utf16Le => {
                for unit in self.buffer.encode_utf16() {
                    self.raw_buffer.extend(unit.to_le_bytes());
                }
            }
            Encoding::Utf16Be => {
                for unit in self.buffer.encode_utf16() {
                    self.raw_buffer.extend(unit.to_be_bytes());
                }
            }
            Encoding::Utf32Le => {
                for ch in self.buffer.chars() {
                    self.raw_buffer.extend((ch as u32).to_le_bytes());
                }
            }
            Encoding::Utf32Be => {
                for ch in self.buffer.chars() {
                    self.raw_buffer.extend((ch as u32).to_be_bytes());
                }
            }
            Encoding::Any | Encoding::Utf8 => unreachable!("handled above"),
        }

        self.write_handler
            .as_mut()
            .expect("non-null writer")
            .write_all(&self.raw_buffer)?;
        self.buffer.clear();
        self.raw_buffer.clear();
        Ok(())
    }
}
