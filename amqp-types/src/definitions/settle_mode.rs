use amqp_codec::{AccessError, Value};

/// 2.8.2 Sender settle mode: the settlement policy a sender will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SenderSettleMode {
    /// Every delivery is settled by the sender only after the receiver
    /// has settled it.
    Unsettled,
    /// The sender settles every delivery as soon as it sends it.
    Settled,
    /// The sender MAY settle either way, decided per delivery.
    #[default]
    Mixed,
}

impl From<SenderSettleMode> for u8 {
    fn from(mode: SenderSettleMode) -> Self {
        match mode {
            SenderSettleMode::Unsettled => 0,
            SenderSettleMode::Settled => 1,
            SenderSettleMode::Mixed => 2,
        }
    }
}

impl TryFrom<u8> for SenderSettleMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SenderSettleMode::Unsettled),
            1 => Ok(SenderSettleMode::Settled),
            2 => Ok(SenderSettleMode::Mixed),
            other => Err(other),
        }
    }
}

impl From<SenderSettleMode> for Value {
    fn from(mode: SenderSettleMode) -> Self {
        Value::UByte(mode.into())
    }
}

impl TryFrom<&Value> for SenderSettleMode {
    type Error = AccessError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let byte = value.as_ubyte()?;
        SenderSettleMode::try_from(byte).map_err(|_| AccessError::Overflow)
    }
}

/// 2.8.3 Receiver settle mode: the settlement policy a receiver will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ReceiverSettleMode {
    /// The receiver spontaneously settles the delivery on arrival.
    #[default]
    First,
    /// The receiver settles only after sending its own disposition and
    /// receiving a settled disposition back.
    Second,
}

impl From<ReceiverSettleMode> for u8 {
    fn from(mode: ReceiverSettleMode) -> Self {
        match mode {
            ReceiverSettleMode::First => 0,
            ReceiverSettleMode::Second => 1,
        }
    }
}

impl TryFrom<u8> for ReceiverSettleMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReceiverSettleMode::First),
            1 => Ok(ReceiverSettleMode::Second),
            other => Err(other),
        }
    }
}

impl From<ReceiverSettleMode> for Value {
    fn from(mode: ReceiverSettleMode) -> Self {
        Value::UByte(mode.into())
    }
}

impl TryFrom<&Value> for ReceiverSettleMode {
    type Error = AccessError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let byte = value.as_ubyte()?;
        ReceiverSettleMode::try_from(byte).map_err(|_| AccessError::Overflow)
    }
}
