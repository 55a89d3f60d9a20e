//! Call engine: validates a call, submits it through the target's driver,
//! grows record buffers on "record buffer too short" and keeps the
//! open/transaction bookkeeping of the target.

use std::sync::Arc;

use crate::abd::{Buffer, BufferId};
use crate::acbx::{Acbx, CommandCode};
use crate::config::ClientConfig;
use crate::driver::{DefaultDriverFactory, DriverFactory};
use crate::error::{DatabaseError, GenericError, Result};
use crate::fdt::Fdt;
use crate::field::Definition;
use crate::id::{Platform, SessionId, TargetState};
use crate::logging::Logger;
use crate::response;
use crate::url::Url;

/// Size of the record buffer for a file definition read.
const FDT_RECORD_SIZE: usize = 8192;

/// Submits calls to one target URL on behalf of a session.
///
/// Engines sharing a [`SessionId`] share the target state, so two engines
/// for the same URL serialize on one lock and see the same open and
/// transaction state.
#[derive(Debug, Clone)]
pub struct CallEngine {
    session: Arc<SessionId>,
    url: Url,
    factory: Arc<dyn DriverFactory>,
    config: ClientConfig,
    logger: Arc<dyn Logger>,
}

impl CallEngine {
    /// Engine with the scheme-selected drivers.
    pub fn new(session: Arc<SessionId>, url: Url, config: ClientConfig) -> Self {
        let logger = session.logger().clone();
        let factory = Arc::new(DefaultDriverFactory::new(config.clone(), logger.clone()));
        Self::with_factory(session, url, config, factory)
    }

    /// Engine creating its drivers through `factory`.
    pub fn with_factory(
        session: Arc<SessionId>,
        url: Url,
        config: ClientConfig,
        factory: Arc<dyn DriverFactory>,
    ) -> Self {
        let logger = session.logger().clone();
        Self {
            session,
            url,
            factory,
            config,
            logger,
        }
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Session this engine belongs to.
    pub fn session(&self) -> &Arc<SessionId> {
        &self.session
    }

    /// Control block addressed to this target.
    pub fn acbx(&self) -> Acbx {
        Acbx::new(self.url.dbid)
    }

    /// Sends one call and interprets the reply.
    ///
    /// Responses 0 to 3 succeed; anything above fails with a
    /// [`DatabaseError`] carrying the returned control block.
    pub async fn call(&self, acbx: &mut Acbx, buffers: &mut [Buffer]) -> Result<()> {
        let status = self.session.status(&self.url);
        let mut state = status.lock().await;
        self.call_locked(&mut state, acbx, buffers).await
    }

    async fn call_locked(
        &self,
        state: &mut TargetState,
        acbx: &mut Acbx,
        buffers: &mut [Buffer],
    ) -> Result<()> {
        for buffer in buffers.iter_mut() {
            buffer.reset_send_size();
        }
        self.dispatch(state, acbx, buffers).await
    }

    /// Sends a prepared call: buffer lengths are taken as they are.
    async fn dispatch(
        &self,
        state: &mut TargetState,
        acbx: &mut Acbx,
        buffers: &mut [Buffer],
    ) -> Result<()> {
        if !acbx.command.is_valid() {
            return Err(GenericError::invalid_command_before_call(&acbx.command.to_string()).into());
        }
        acbx.response = response::NOT_ACTIVE;
        acbx.subcode = 0;
        if self.logger.is_debug() {
            self.logger
                .debug(format_args!("Call {} on {}\n{}", acbx.command, self.url, acbx));
        }

        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            self.submit(state, acbx, buffers).await?;
            if !acbx.command.is_valid() {
                return Err(
                    GenericError::invalid_command_after_call(&acbx.command.to_string()).into(),
                );
            }
            if acbx.response != response::RECORD_BUFFER_TOO_SHORT || attempt >= retry.max_retries {
                break;
            }
            attempt += 1;
            for buffer in buffers
                .iter_mut()
                .filter(|b| b.buffer_id() == Some(BufferId::Record))
            {
                buffer.extend(retry.grow_step);
                buffer.reset_send_size();
            }
            tracing::debug!(
                url = %self.url,
                attempt,
                grow_step = retry.grow_step,
                "record buffer too short, retrying"
            );
        }

        if acbx.command == CommandCode::CL {
            self.drop_driver(state).await;
        }
        if response::resets_session(acbx.response) {
            state.reset_session();
        }
        if response::is_error(acbx.response) {
            self.logger.debug(format_args!(
                "Call {} on {} returned {}",
                acbx.command, self.url, acbx.response
            ));
            return Err(DatabaseError::new(acbx, self.url.to_string()).into());
        }
        if acbx.response == response::NORMAL && acbx.command.is_update() {
            state.open_transactions += 1;
        }
        Ok(())
    }

    /// Hands the call to the driver, connecting first when needed.
    async fn submit(
        &self,
        state: &mut TargetState,
        acbx: &mut Acbx,
        buffers: &mut [Buffer],
    ) -> Result<()> {
        if state.driver.is_none() {
            let mut driver = self.factory.create(&self.url, self.session.ada_id())?;
            if let Err(e) = driver.connect(acbx).await {
                tracing::debug!(url = %self.url, error = %e, "connect failed");
                acbx.response = response::SYSTEM_COMMUNICATION;
                state.reset_session();
                return Err(e);
            }
            state.driver = Some(driver);
        }
        let Some(driver) = state.driver.as_mut() else {
            return Err(GenericError::already_disconnected().into());
        };
        let sent = driver.send(acbx, buffers).await;
        if let Err(e) = sent {
            tracing::debug!(url = %self.url, error = %e, "send failed, dropping driver");
            self.drop_driver(state).await;
            state.reset_session();
            return Err(e);
        }
        Ok(())
    }

    async fn drop_driver(&self, state: &mut TargetState) {
        if let Some(mut driver) = state.driver.take() {
            if driver.is_connected() {
                if let Err(e) = driver.disconnect().await {
                    self.logger
                        .debug(format_args!("Disconnect {} failed: {}", self.url, e));
                }
            }
        }
    }

    /// Opens a user session. Does nothing when the target is already open.
    pub async fn open(&self) -> Result<()> {
        let status = self.session.status(&self.url);
        let mut state = status.lock().await;
        self.open_locked(&mut state).await
    }

    async fn open_locked(&self, state: &mut TargetState) -> Result<()> {
        if state.open {
            return Ok(());
        }
        let mut acbx = self.acbx();
        acbx.command = CommandCode::OP;
        let mut format = Buffer::new(BufferId::Format);
        format.write_string(" ");
        format.abd_mut().recv = 0;
        let mut record = Buffer::new(BufferId::Record);
        record.write_string("UPD.");
        let mut buffers = [format, record];
        // the record buffer carries the open options, so it is sent as written
        self.dispatch(state, &mut acbx, &mut buffers).await?;
        if acbx.response == response::NORMAL {
            let platform = Platform::from_isl(acbx.isn_lower_limit);
            tracing::debug!(url = %self.url, platform = %platform, "session opened");
            state.open = true;
            state.platform = Some(platform);
        }
        Ok(())
    }

    /// Ends the user session: backs out pending changes, then closes.
    pub async fn close(&self) -> Result<()> {
        let status = self.session.status(&self.url);
        let mut state = status.lock().await;
        if !state.open {
            return Ok(());
        }
        if state.open_transactions > 0 {
            if let Err(e) = self.simple_call(&mut state, CommandCode::BT).await {
                self.logger
                    .debug(format_args!("Implicit backout on {} failed: {}", self.url, e));
            }
        }
        if let Err(e) = self.simple_call(&mut state, CommandCode::CL).await {
            self.logger
                .debug(format_args!("Close on {} failed: {}", self.url, e));
        }
        state.reset_session();
        Ok(())
    }

    /// Commits the open transaction.
    pub async fn end_transaction(&self) -> Result<()> {
        self.finish_transaction(CommandCode::ET).await
    }

    /// Rolls back the open transaction.
    pub async fn backout_transaction(&self) -> Result<()> {
        self.finish_transaction(CommandCode::BT).await
    }

    async fn finish_transaction(&self, command: CommandCode) -> Result<()> {
        let status = self.session.status(&self.url);
        let mut state = status.lock().await;
        if !state.open || state.open_transactions == 0 {
            return Ok(());
        }
        let result = self.simple_call(&mut state, command).await;
        // a failed commit leaves the changes pending
        if result.is_ok() || command == CommandCode::BT {
            state.open_transactions = 0;
        }
        result
    }

    /// Releases a command id held by the server.
    pub async fn release_cid(&self, cid: [u8; 4]) -> Result<()> {
        let status = self.session.status(&self.url);
        let mut state = status.lock().await;
        let mut acbx = self.acbx();
        acbx.command = CommandCode::RC;
        acbx.cid = cid;
        acbx.reset_options();
        self.call_locked(&mut state, &mut acbx, &mut []).await
    }

    async fn simple_call(&self, state: &mut TargetState, command: CommandCode) -> Result<()> {
        let mut acbx = self.acbx();
        acbx.command = command;
        self.call_locked(state, &mut acbx, &mut []).await
    }

    /// Reads and parses the field definition table of `file`.
    pub async fn read_fdt(&self, file: u32) -> Result<Definition> {
        let status = self.session.status(&self.url);
        let mut state = status.lock().await;
        self.open_locked(&mut state).await?;

        let mut acbx = self.acbx();
        acbx.command = CommandCode::LF;
        acbx.reset_options();
        acbx.options[1] = b'X';
        acbx.isn = 1;
        acbx.isn_quantity = 0;
        acbx.file = file;
        let mut format = Buffer::new(BufferId::Format);
        format.write_string(".");
        let record = Buffer::with_size(BufferId::Record, FDT_RECORD_SIZE);
        let mut buffers = [format, record];
        self.call_locked(&mut state, &mut acbx, &mut buffers).await?;
        drop(state);

        let fdt = Fdt::parse(buffers[1].received_bytes())?;
        tracing::debug!(url = %self.url, file, entries = fdt.entries.len(), "FDT read");
        fdt.definition()
    }
}
