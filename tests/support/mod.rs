//! Shared transport double for integration tests
//!
//! The scripted transport plays the device side of a session: each
//! expected command is paired with the reply the device would send,
//! and any write that deviates from the script fails the test. State
//! is shared through a handle so tests can make assertions after the
//! transport has been boxed into the session.

// Each integration test binary uses a different subset of these
// helpers.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ndicapi_rust::io::{CommParams, Transport};
use ndicapi_rust::protocol::{frame_command, text_crc};
use ndicapi_rust::Result;

/// Appends the checksum and terminator to a reply payload.
pub fn framed_reply(payload: &str) -> Vec<u8> {
    let mut reply = payload.as_bytes().to_vec();
    let crc = text_crc(payload.as_bytes());
    reply.extend_from_slice(format!("{:04X}\r", crc).as_bytes());
    reply
}

#[derive(Default)]
pub struct ScriptState {
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    incoming: VecDeque<u8>,
    pub written: Vec<Vec<u8>>,
    pub breaks: usize,
    pub params: Vec<CommParams>,
    on_break: Option<Vec<u8>>,
}

impl ScriptState {
    /// Scripted exchanges that have not been consumed yet.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

/// Transport double that checks each written command against a script
/// and answers with the scripted reply.
pub struct ScriptedTransport {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport {
            state: Rc::new(RefCell::new(ScriptState::default())),
        }
    }

    /// Shared view of the script state for assertions.
    pub fn state(&self) -> Rc<RefCell<ScriptState>> {
        Rc::clone(&self.state)
    }

    /// Expects `command` (framed with a checksum) and answers with
    /// `payload` framed the same way.
    pub fn expect(self, command: &str, payload: &str) -> Self {
        let framed = frame_command(command.as_bytes(), true).unwrap();
        let reply = framed_reply(payload);
        self.state.borrow_mut().script.push_back((framed, reply));
        self
    }

    /// Expects `command` and answers with raw reply bytes.
    pub fn expect_raw(self, command: &str, reply: Vec<u8>) -> Self {
        let framed = frame_command(command.as_bytes(), true).unwrap();
        self.state.borrow_mut().script.push_back((framed, reply));
        self
    }

    /// Queues bytes that arrive after a serial break.
    pub fn reply_on_break(self, reply: Vec<u8>) -> Self {
        self.state.borrow_mut().on_break = Some(reply);
        self
    }
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.written.push(bytes.to_vec());
        let (expected, reply) = state
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command {:?}", String::from_utf8_lossy(bytes)));
        assert_eq!(
            bytes,
            expected.as_slice(),
            "command mismatch: got {:?}, expected {:?}",
            String::from_utf8_lossy(bytes),
            String::from_utf8_lossy(&expected)
        );
        state.incoming.extend(reply);
        Ok(())
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.state.borrow_mut().incoming.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn send_break(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.breaks += 1;
        if let Some(reply) = state.on_break.take() {
            state.incoming.extend(reply);
        }
        Ok(())
    }

    fn set_params(&mut self, params: CommParams) -> Result<()> {
        self.state.borrow_mut().params.push(params);
        Ok(())
    }
}
