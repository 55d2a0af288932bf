//! Raspberry Pi I²C HAT backend.
//!
//! Talks to an MCP23017-style I/O expander over I²C using `rppal`.
//! Only compiled with the `hardware` feature; the simulator is the
//! default backend for the workspace and for `roofd` unless this
//! feature is explicitly enabled at build time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use roof_errors::HatIoError;
use rppal::i2c::I2c;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::{HatPort, InputEdge, InputId, RelayId, validate_line};

/// Register addresses on the MCP23017 I/O expander, bank A used for
/// relay outputs and bank B for digital inputs.
mod registers {
    pub const IODIRA: u8 = 0x00;
    pub const IODIRB: u8 = 0x01;
    pub const GPIOA: u8 = 0x12;
    pub const GPIOB: u8 = 0x13;
}

/// Configuration for the Raspberry Pi HAT backend.
#[derive(Debug, Clone, Copy)]
pub struct RpiHatConfig {
    /// I²C bus number (`/dev/i2c-<bus>`).
    pub bus: u8,
    /// 7-bit I²C device address of the HAT.
    pub address: u16,
    /// Retry attempts per relay write before surfacing an error.
    pub max_attempts: u32,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
    /// Cadence at which raw inputs are polled for edge detection.
    pub poll_interval: Duration,
}

struct Bus {
    i2c: I2c,
    disposed: bool,
}

/// Real Raspberry Pi HAT implementation, backed by an MCP23017-class
/// I/O expander reached over I²C via `rppal`.
pub struct Mcp23017Hat {
    bus: Arc<Mutex<Bus>>,
    config: RpiHatConfig,
    edge_txs: Arc<Mutex<Vec<mpsc::Sender<InputEdge>>>>,
}

impl Mcp23017Hat {
    /// Open the I²C bus and configure bank A as outputs (relays) and
    /// bank B as inputs (limit/fault/at-speed lines).
    pub fn open(config: RpiHatConfig) -> Result<Self, HatIoError> {
        let mut i2c = I2c::with_bus(config.bus)
            .map_err(|e| HatIoError::ReadFailed(format!("opening I2C bus {}: {e}", config.bus)))?;
        i2c.set_slave_address(config.address)
            .map_err(|e| HatIoError::ReadFailed(format!("setting I2C address: {e}")))?;
        i2c.smbus_write_byte(registers::IODIRA, 0x00)
            .map_err(|e| HatIoError::ReadFailed(format!("configuring relay bank: {e}")))?;
        i2c.smbus_write_byte(registers::IODIRB, 0xFF)
            .map_err(|e| HatIoError::ReadFailed(format!("configuring input bank: {e}")))?;

        Ok(Self {
            bus: Arc::new(Mutex::new(Bus { i2c, disposed: false })),
            config,
            edge_txs: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn write_relay_register(&self, id: RelayId, on: bool) -> Result<(), HatIoError> {
        let mut bus = self.bus.lock();
        if bus.disposed {
            return Err(HatIoError::Disposed);
        }
        let current = bus
            .i2c
            .smbus_read_byte(registers::GPIOA)
            .map_err(|e| HatIoError::Transient(e.to_string()))?;
        let bit = 1u8 << (id - 1);
        let next = if on { current | bit } else { current & !bit };
        bus.i2c
            .smbus_write_byte(registers::GPIOA, next)
            .map_err(|e| HatIoError::Transient(e.to_string()))
    }

    fn read_input_register(&self) -> Result<u8, HatIoError> {
        let mut bus = self.bus.lock();
        if bus.disposed {
            return Err(HatIoError::Disposed);
        }
        bus.i2c
            .smbus_read_byte(registers::GPIOB)
            .map_err(|e| HatIoError::ReadFailed(e.to_string()))
    }
}

#[async_trait]
impl HatPort for Mcp23017Hat {
    async fn try_set_relay(&self, id: RelayId, on: bool) -> Result<(), HatIoError> {
        if !validate_line(id) {
            return Err(HatIoError::InvalidRelay(id));
        }
        let mut last_err = None;
        for attempt in 1..=self.config.max_attempts.max(1) {
            match self.write_relay_register(id, on) {
                Ok(()) => return Ok(()),
                Err(HatIoError::Disposed) => return Err(HatIoError::Disposed),
                Err(err) => {
                    warn!(relay = id, attempt, %err, "relay write attempt failed");
                    last_err = Some(err);
                    if attempt < self.config.max_attempts {
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
        let err = HatIoError::relay_write_failed(
            id,
            self.config.max_attempts,
            last_err.map_or_else(|| "unknown".to_string(), |e| e.to_string()),
        );
        error!(relay = id, %err, "relay write exhausted retry budget");
        Err(err)
    }

    async fn read_all_inputs(&self) -> Result<[bool; 4], HatIoError> {
        let raw = self.read_input_register()?;
        Ok([
            raw & 0b0001 != 0,
            raw & 0b0010 != 0,
            raw & 0b0100 != 0,
            raw & 0b1000 != 0,
        ])
    }

    async fn subscribe_edges(&self) -> Result<mpsc::Receiver<InputEdge>, HatIoError> {
        let (tx, rx) = mpsc::channel(32);
        self.edge_txs.lock().push(tx.clone());

        let bus = Arc::clone(&self.bus);
        let edge_txs = Arc::clone(&self.edge_txs);
        let poll_interval = self.config.poll_interval;
        tokio::spawn(async move {
            let mut last = [false; 4];
            loop {
                sleep(poll_interval).await;
                let disposed = bus.lock().disposed;
                if disposed {
                    break;
                }
                let raw = {
                    let mut guard = bus.lock();
                    guard.i2c.smbus_read_byte(registers::GPIOB)
                };
                let Ok(raw) = raw else { continue };
                let levels = [
                    raw & 0b0001 != 0,
                    raw & 0b0010 != 0,
                    raw & 0b0100 != 0,
                    raw & 0b1000 != 0,
                ];
                for (idx, (&prev, &now)) in last.iter().zip(levels.iter()).enumerate() {
                    if prev != now {
                        #[allow(clippy::cast_possible_truncation, reason = "idx is always 0..4")]
                        let input = (idx as u8) + 1;
                        let edge = InputEdge { input, raw_level: now };
                        edge_txs.lock().retain(|tx| tx.try_send(edge).is_ok());
                    }
                }
                last = levels;
            }
        });

        Ok(rx)
    }

    async fn dispose(&self) {
        self.bus.lock().disposed = true;
        self.edge_txs.lock().clear();
    }
}
