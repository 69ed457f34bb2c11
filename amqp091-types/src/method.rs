//! Method registry
//!
//! Maps a (class id, method id) pair to a typed method. A method frame payload is the two ids
//! followed by the method's argument list.

use amqp091_wire::{
    codec::read_u16,
    Decode, Encode, Error as WireError,
};
use bytes::{Buf, BufMut, BytesMut};

use crate::{error::Error, methods::*, properties::Content};

macro_rules! registry {
    ($($name:ident = ($class:literal, $method:literal)),* $(,)?) => {
        /// A method of any class with its arguments
        #[derive(Debug, Clone, PartialEq, Eq)]
        #[allow(missing_docs)]
        pub enum Method {
            $( $name($name), )*
        }

        /// Identifies a method without its arguments
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum MethodKind {
            $( $name, )*
        }

        $(
            impl $name {
                /// Class id
                pub const CLASS_ID: u16 = $class;

                /// Method id
                pub const METHOD_ID: u16 = $method;
            }

            impl From<$name> for Method {
                fn from(value: $name) -> Self {
                    Method::$name(value)
                }
            }

            impl TryFrom<Method> for $name {
                type Error = Method;

                fn try_from(value: Method) -> Result<Self, Self::Error> {
                    match value {
                        Method::$name(m) => Ok(m),
                        other => Err(other),
                    }
                }
            }
        )*

        impl MethodKind {
            /// Find the method registered for the pair of ids
            pub fn lookup(class_id: u16, method_id: u16) -> Result<Self, Error> {
                match (class_id, method_id) {
                    $( ($class, $method) => Ok(MethodKind::$name), )*
                    _ => Err(Error::UnknownMethod { class_id, method_id }),
                }
            }

            /// (class id, method id)
            pub fn id(&self) -> (u16, u16) {
                match self {
                    $( MethodKind::$name => ($class, $method), )*
                }
            }

            /// Name of the method
            pub fn name(&self) -> &'static str {
                match self {
                    $( MethodKind::$name => stringify!($name), )*
                }
            }

            /// A fresh method of this kind with every argument zero-valued
            pub fn prototype(&self) -> Method {
                match self {
                    $( MethodKind::$name => Method::$name($name::default()), )*
                }
            }

            /// Decode the argument list of a method of this kind
            pub fn decode_args<B: Buf>(&self, src: &mut B) -> Result<Method, WireError> {
                let method = match self {
                    $( MethodKind::$name => Method::$name($name::decode(src)?), )*
                };
                Ok(method)
            }
        }

        impl Method {
            /// The kind of the method
            pub fn kind(&self) -> MethodKind {
                match self {
                    $( Method::$name(_) => MethodKind::$name, )*
                }
            }

            fn encode_args(&self, dst: &mut BytesMut) -> Result<(), WireError> {
                match self {
                    $( Method::$name(m) => m.encode(dst), )*
                }
            }

            fn args_len(&self) -> usize {
                match self {
                    $( Method::$name(m) => m.encoded_len(), )*
                }
            }
        }
    };
}

registry! {
    ConnectionStart = (10, 10),
    ConnectionStartOk = (10, 11),
    ConnectionSecure = (10, 20),
    ConnectionSecureOk = (10, 21),
    ConnectionTune = (10, 30),
    ConnectionTuneOk = (10, 31),
    ConnectionOpen = (10, 40),
    ConnectionOpenOk = (10, 41),
    ConnectionClose = (10, 50),
    ConnectionCloseOk = (10, 51),
    ConnectionBlocked = (10, 60),
    ConnectionUnblocked = (10, 61),
    ConnectionUpdateSecret = (10, 70),
    ConnectionUpdateSecretOk = (10, 71),

    ChannelOpen = (20, 10),
    ChannelOpenOk = (20, 11),
    ChannelFlow = (20, 20),
    ChannelFlowOk = (20, 21),
    ChannelClose = (20, 40),
    ChannelCloseOk = (20, 41),

    ExchangeDeclare = (40, 10),
    ExchangeDeclareOk = (40, 11),
    ExchangeDelete = (40, 20),
    ExchangeDeleteOk = (40, 21),
    ExchangeBind = (40, 30),
    ExchangeBindOk = (40, 31),
    ExchangeUnbind = (40, 40),
    ExchangeUnbindOk = (40, 51),

    QueueDeclare = (50, 10),
    QueueDeclareOk = (50, 11),
    QueueBind = (50, 20),
    QueueBindOk = (50, 21),
    QueuePurge = (50, 30),
    QueuePurgeOk = (50, 31),
    QueueDelete = (50, 40),
    QueueDeleteOk = (50, 41),
    QueueUnbind = (50, 50),
    QueueUnbindOk = (50, 51),

    BasicQos = (60, 10),
    BasicQosOk = (60, 11),
    BasicConsume = (60, 20),
    BasicConsumeOk = (60, 21),
    BasicCancel = (60, 30),
    BasicCancelOk = (60, 31),
    BasicPublish = (60, 40),
    BasicReturn = (60, 50),
    BasicDeliver = (60, 60),
    BasicGet = (60, 70),
    BasicGetOk = (60, 71),
    BasicGetEmpty = (60, 72),
    BasicAck = (60, 80),
    BasicReject = (60, 90),
    BasicRecoverAsync = (60, 100),
    BasicRecover = (60, 110),
    BasicRecoverOk = (60, 111),
    BasicNack = (60, 120),

    ConfirmSelect = (85, 10),
    ConfirmSelectOk = (85, 11),

    TxSelect = (90, 10),
    TxSelectOk = (90, 11),
    TxCommit = (90, 20),
    TxCommitOk = (90, 21),
    TxRollback = (90, 30),
    TxRollbackOk = (90, 31),
}

impl MethodKind {
    /// Whether methods of this kind are followed by a content header and body
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            MethodKind::BasicPublish
                | MethodKind::BasicReturn
                | MethodKind::BasicDeliver
                | MethodKind::BasicGetOk
        )
    }
}

impl Method {
    /// Class id
    pub fn class_id(&self) -> u16 {
        self.kind().id().0
    }

    /// Method id
    pub fn method_id(&self) -> u16 {
        self.kind().id().1
    }

    /// Name of the method
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether the sender must wait for a synchronous reply before proceeding
    pub fn wait(&self) -> bool {
        match self {
            Method::ExchangeDeclare(m) => !m.no_wait,
            Method::ExchangeDelete(m) => !m.no_wait,
            Method::ExchangeBind(m) => !m.no_wait,
            Method::ExchangeUnbind(m) => !m.no_wait,
            Method::QueueDeclare(m) => !m.no_wait,
            Method::QueueBind(m) => !m.no_wait,
            Method::QueuePurge(m) => !m.no_wait,
            Method::QueueDelete(m) => !m.no_wait,
            Method::BasicConsume(m) => !m.no_wait,
            Method::BasicCancel(m) => !m.no_wait,
            Method::ConnectionBlocked(_)
            | Method::ConnectionUnblocked(_)
            | Method::ConnectionUpdateSecretOk(_)
            | Method::BasicPublish(_)
            | Method::BasicReturn(_)
            | Method::BasicDeliver(_)
            | Method::BasicAck(_)
            | Method::BasicReject(_)
            | Method::BasicRecoverAsync(_)
            | Method::BasicNack(_) => false,
            _ => true,
        }
    }

    /// Whether the method is followed by a content header and body
    pub fn has_content(&self) -> bool {
        self.kind().has_content()
    }

    /// The attached content of a content-bearing method
    pub fn content(&self) -> Option<&Content> {
        match self {
            Method::BasicPublish(m) => Some(&m.content),
            Method::BasicReturn(m) => Some(&m.content),
            Method::BasicDeliver(m) => Some(&m.content),
            Method::BasicGetOk(m) => Some(&m.content),
            _ => None,
        }
    }

    /// Attach content, handing it back if the method carries none
    pub fn set_content(&mut self, content: Content) -> Result<(), Content> {
        match self {
            Method::BasicPublish(m) => m.content = content,
            Method::BasicReturn(m) => m.content = content,
            Method::BasicDeliver(m) => m.content = content,
            Method::BasicGetOk(m) => m.content = content,
            _ => return Err(content),
        }
        Ok(())
    }

    /// Detach the content, leaving an empty one in its place
    pub fn take_content(&mut self) -> Option<Content> {
        match self {
            Method::BasicPublish(m) => Some(std::mem::take(&mut m.content)),
            Method::BasicReturn(m) => Some(std::mem::take(&mut m.content)),
            Method::BasicDeliver(m) => Some(std::mem::take(&mut m.content)),
            Method::BasicGetOk(m) => Some(std::mem::take(&mut m.content)),
            _ => None,
        }
    }

    /// Decode a method frame payload
    pub fn decode_payload<B: Buf>(src: &mut B) -> Result<Self, Error> {
        let class_id = read_u16(src)?;
        let method_id = read_u16(src)?;
        let kind = MethodKind::lookup(class_id, method_id)?;
        kind.decode_args(src).map_err(Into::into)
    }
}

impl Encode for Method {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), WireError> {
        let start = dst.len();
        let (class_id, method_id) = self.kind().id();
        dst.put_u16(class_id);
        dst.put_u16(method_id);
        if let Err(err) = self.encode_args(dst) {
            dst.truncate(start);
            return Err(err);
        }
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        4 + self.args_len()
    }
}
