/// Defines a method argument struct together with its wire encoding
///
/// Each field names the argument kind used on the wire (`octet`, `short`, `long`, `longlong`,
/// `shortstr`, `longstr`, `binary`, `table`, `bit`). Fields of kind `content` are not part of
/// the argument list and travel in the content header and body frames instead.
macro_rules! method_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                pub $field:ident: $ty:ty => $kind:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl amqp091_wire::Encode for $name {
            #[allow(unused_mut)]
            fn encode(&self, dst: &mut bytes::BytesMut) -> Result<(), amqp091_wire::Error> {
                let mut writer = $crate::args::ArgWriter::new(dst);
                $( writer.$kind(&self.$field)?; )*
                writer.finish()
            }

            #[allow(unused_mut)]
            fn encoded_len(&self) -> usize {
                let mut len = $crate::args::ArgLen::default();
                $( len.$kind(&self.$field); )*
                len.finish()
            }
        }

        impl amqp091_wire::Decode for $name {
            #[allow(unused_mut, unused_variables)]
            fn decode<B: bytes::Buf>(src: &mut B) -> Result<Self, amqp091_wire::Error> {
                let mut reader = $crate::args::ArgReader::new(src);
                Ok(Self {
                    $( $field: reader.$kind()?, )*
                })
            }
        }
    };
}
