//! Field definition table (FDT) records.
//!
//! The database returns the definition of a file as a 16 byte header
//! followed by a sequence of entries. Each entry starts with a one byte
//! identifier and a one byte total length and is zero padded to that
//! length. [`Fdt`] keeps the decoded entries as they came off the wire so
//! they can be written back unchanged, and builds the typed field tree
//! ([`Definition`]) from them.

use bytes::BytesMut;

use crate::codec::{Decoder, Encoder, Endian};
use crate::error::{GenericError, Result};
use crate::field::{
    Collation, Definition, DescriptorKind, FieldNode, FieldOptions, FieldType, HyperExit, Leaf,
    NodeId, NodeKind, Phonetic, Referential, ReferentialAction, SubEntry, SuperDescriptor,
};

/// Size of the FDT header.
pub const HEADER_LENGTH: usize = 16;

const ID_FIELD: u8 = b'F';
const ID_SUB: u8 = b'S';
const ID_SUPER: u8 = b'T';
const ID_PHONETIC: u8 = b'P';
const ID_COLLATION: u8 = b'C';
const ID_HYPER_EXIT: u8 = b'H';
const ID_REFERENTIAL: u8 = b'R';

/// Bits of the first option byte.
pub mod option {
    /// Unique descriptor.
    pub const UQ: u8 = 0x01;
    /// Sub descriptor source.
    pub const SB: u8 = 0x02;
    /// Phonetic source.
    pub const PH: u8 = 0x04;
    /// Periodic group.
    pub const PE: u8 = 0x08;
    /// Null suppression.
    pub const NU: u8 = 0x10;
    /// Multiple value field.
    pub const MU: u8 = 0x20;
    /// Fixed storage.
    pub const FI: u8 = 0x40;
    /// Descriptor.
    pub const DE: u8 = 0x80;
}

/// Bits of the second option byte of a field entry.
pub mod option2 {
    /// SQL null value allowed.
    pub const NC: u8 = 0x01;
    /// SQL not null.
    pub const NN: u8 = 0x02;
    /// Four byte length prefix.
    pub const LB: u8 = 0x04;
    /// Two byte length prefix.
    pub const LA: u8 = 0x08;
    /// High order first.
    pub const HF: u8 = 0x20;
    /// No conversion.
    pub const NV: u8 = 0x40;
    /// No blank suppression.
    pub const NB: u8 = 0x80;
}

/// The 16 byte table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdtHeader {
    /// Total length of the table including this header.
    pub length: u32,
    /// Layout level of the table.
    pub structure_level: u8,
    /// Table flags.
    pub flag: u8,
    /// Number of entries following the header.
    pub count: u16,
    /// Definition timestamp.
    pub time: u64,
}

/// One range of a sub or super descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    /// Parent field.
    pub name: [u8; 2],
    /// First byte, 1 based.
    pub from: u16,
    /// Last byte.
    pub to: u16,
}

/// Decoded body of an FDT entry.
///
/// Every variant keeps the raw bytes so the entry writes back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    /// Data field or group (`F`).
    Field {
        /// Format character, space for a group.
        format: u8,
        /// See [`option`].
        option: u8,
        /// See [`option2`].
        option2: u8,
        /// Level in the record structure.
        level: u8,
        /// Edit mask number.
        edit_mask: u8,
        /// Date/time sub option.
        sub_option: u8,
        /// System generated value.
        sys_function: u8,
        /// Deactivation flag.
        deactivate: u8,
        /// Standard length.
        length: u32,
    },
    /// Sub (`S`) or super (`T`) descriptor.
    Descriptor {
        /// Sub or super.
        kind: DescriptorKind,
        /// Format character.
        format: u8,
        /// See [`option`].
        option: u8,
        /// Descriptor length.
        length: u16,
        /// Second option byte.
        option2: u8,
        /// Parent field ranges.
        ranges: Vec<RangeEntry>,
    },
    /// Phonetic descriptor (`P`).
    Phonetic {
        /// Format character.
        format: u8,
        /// Option byte.
        option: u8,
        /// Descriptor length.
        length: u16,
        /// Unused.
        filler: [u8; 2],
        /// Source field.
        parent: [u8; 2],
    },
    /// Collation descriptor (`C`).
    Collation {
        /// Format character.
        format: u8,
        /// Option byte.
        option: u8,
        /// Descriptor length.
        length: u16,
        /// Source field.
        parent: [u8; 2],
        /// Internal key length.
        internal_length: u16,
        /// Second option byte.
        option2: u8,
        /// Locale attribute, such as `de@collation=phonebook`.
        attribute: Vec<u8>,
    },
    /// Hyper exit descriptor (`H`).
    HyperExit {
        /// Format character.
        format: u8,
        /// Option byte.
        option: u8,
        /// Descriptor length.
        length: u16,
        /// Exit number.
        exit: u8,
        /// Second option byte.
        option2: u8,
        /// Unused.
        filler: u8,
        /// Source fields.
        parents: Vec<[u8; 2]>,
    },
    /// Referential constraint (`R`).
    Referential {
        /// Primary file.
        file: u32,
        /// Key in the primary file.
        primary_key: [u8; 2],
        /// Key in this file.
        foreign_key: [u8; 2],
        /// Constraint type.
        ref_type: u8,
        /// Action on update of the primary key.
        update_action: u8,
        /// Action on delete of the primary record.
        delete_action: u8,
    },
}

/// One entry of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdtEntry {
    /// Declared entry length including identifier and length bytes.
    pub length: u8,
    /// Short name.
    pub name: [u8; 2],
    /// Decoded content.
    pub body: EntryBody,
}

impl FdtEntry {
    /// Short name as text.
    pub fn name(&self) -> String {
        name_string(&self.name)
    }

    /// Identifier byte written in front of the entry.
    pub fn identifier(&self) -> u8 {
        match &self.body {
            EntryBody::Field { .. } => ID_FIELD,
            EntryBody::Descriptor {
                kind: DescriptorKind::Sub,
                ..
            } => ID_SUB,
            EntryBody::Descriptor { .. } => ID_SUPER,
            EntryBody::Phonetic { .. } => ID_PHONETIC,
            EntryBody::Collation { .. } => ID_COLLATION,
            EntryBody::HyperExit { .. } => ID_HYPER_EXIT,
            EntryBody::Referential { .. } => ID_REFERENTIAL,
        }
    }

    fn decode(id: u8, length: u8, d: &mut Decoder<'_>) -> Result<Self> {
        let name = d.get_array::<2>()?;
        let body = match id {
            ID_FIELD => EntryBody::Field {
                format: d.get_u8()?,
                option: d.get_u8()?,
                option2: d.get_u8()?,
                level: d.get_u8()?,
                edit_mask: d.get_u8()?,
                sub_option: d.get_u8()?,
                sys_function: d.get_u8()?,
                deactivate: d.get_u8()?,
                length: d.get_u32()?,
            },
            ID_SUB | ID_SUPER => {
                let format = d.get_u8()?;
                let option = d.get_u8()?;
                let length = d.get_u16()?;
                let option2 = d.get_u8()?;
                let count = d.get_u8()?;
                let mut ranges = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    ranges.push(RangeEntry {
                        name: d.get_array::<2>()?,
                        from: d.get_u16()?,
                        to: d.get_u16()?,
                    });
                }
                let kind = if id == ID_SUB {
                    DescriptorKind::Sub
                } else {
                    DescriptorKind::Super
                };
                EntryBody::Descriptor {
                    kind,
                    format,
                    option,
                    length,
                    option2,
                    ranges,
                }
            }
            ID_PHONETIC => EntryBody::Phonetic {
                format: d.get_u8()?,
                option: d.get_u8()?,
                length: d.get_u16()?,
                filler: d.get_array::<2>()?,
                parent: d.get_array::<2>()?,
            },
            ID_COLLATION => {
                let format = d.get_u8()?;
                let option = d.get_u8()?;
                let length = d.get_u16()?;
                let parent = d.get_array::<2>()?;
                let internal_length = d.get_u16()?;
                let option2 = d.get_u8()?;
                let attribute_length = d.get_u8()?;
                let attribute = d.get_slice(usize::from(attribute_length))?.to_vec();
                EntryBody::Collation {
                    format,
                    option,
                    length,
                    parent,
                    internal_length,
                    option2,
                    attribute,
                }
            }
            ID_HYPER_EXIT => {
                let format = d.get_u8()?;
                let option = d.get_u8()?;
                let length = d.get_u16()?;
                let exit = d.get_u8()?;
                let option2 = d.get_u8()?;
                let filler = d.get_u8()?;
                let count = d.get_u8()?;
                let mut parents = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    parents.push(d.get_array::<2>()?);
                }
                EntryBody::HyperExit {
                    format,
                    option,
                    length,
                    exit,
                    option2,
                    filler,
                    parents,
                }
            }
            ID_REFERENTIAL => EntryBody::Referential {
                file: d.get_u32()?,
                primary_key: d.get_array::<2>()?,
                foreign_key: d.get_array::<2>()?,
                ref_type: d.get_u8()?,
                update_action: d.get_u8()?,
                delete_action: d.get_u8()?,
            },
            other => return Err(GenericError::unknown_fdt_identifier(other).into()),
        };
        Ok(Self { length, name, body })
    }

    fn encode(&self, e: &mut Encoder<'_, BytesMut>) -> Result<()> {
        e.put_slice(&self.name);
        match &self.body {
            EntryBody::Field {
                format,
                option,
                option2,
                level,
                edit_mask,
                sub_option,
                sys_function,
                deactivate,
                length,
            } => {
                for b in [
                    *format,
                    *option,
                    *option2,
                    *level,
                    *edit_mask,
                    *sub_option,
                    *sys_function,
                    *deactivate,
                ] {
                    e.put_u8(b);
                }
                e.put_u32(*length);
            }
            EntryBody::Descriptor {
                format,
                option,
                length,
                option2,
                ranges,
                ..
            } => {
                e.put_u8(*format);
                e.put_u8(*option);
                e.put_u16(*length);
                e.put_u8(*option2);
                e.put_u8(self.count("range count", ranges.len())?);
                for r in ranges {
                    e.put_slice(&r.name);
                    e.put_u16(r.from);
                    e.put_u16(r.to);
                }
            }
            EntryBody::Phonetic {
                format,
                option,
                length,
                filler,
                parent,
            } => {
                e.put_u8(*format);
                e.put_u8(*option);
                e.put_u16(*length);
                e.put_slice(filler);
                e.put_slice(parent);
            }
            EntryBody::Collation {
                format,
                option,
                length,
                parent,
                internal_length,
                option2,
                attribute,
            } => {
                e.put_u8(*format);
                e.put_u8(*option);
                e.put_u16(*length);
                e.put_slice(parent);
                e.put_u16(*internal_length);
                e.put_u8(*option2);
                e.put_u8(self.count("attribute length", attribute.len())?);
                e.put_slice(attribute);
            }
            EntryBody::HyperExit {
                format,
                option,
                length,
                exit,
                option2,
                filler,
                parents,
            } => {
                e.put_u8(*format);
                e.put_u8(*option);
                e.put_u16(*length);
                e.put_u8(*exit);
                e.put_u8(*option2);
                e.put_u8(*filler);
                e.put_u8(self.count("parent count", parents.len())?);
                for p in parents {
                    e.put_slice(p);
                }
            }
            EntryBody::Referential {
                file,
                primary_key,
                foreign_key,
                ref_type,
                update_action,
                delete_action,
            } => {
                e.put_u32(*file);
                e.put_slice(primary_key);
                e.put_slice(foreign_key);
                e.put_u8(*ref_type);
                e.put_u8(*update_action);
                e.put_u8(*delete_action);
            }
        }
        Ok(())
    }

    fn count(&self, what: &str, n: usize) -> Result<u8> {
        u8::try_from(n).map_err(|_| GenericError::fdt_entry_too_long(&self.name(), what, n).into())
    }

    /// Builds the tree node for this entry.
    ///
    /// A multi-value field yields its value leaf as the second element.
    fn to_nodes(&self) -> Result<(FieldNode, Option<FieldNode>)> {
        let name = self.name();
        let node = match &self.body {
            EntryBody::Field {
                format,
                option,
                option2,
                level,
                edit_mask,
                sub_option,
                sys_function,
                length,
                ..
            } => {
                let level = *level;
                if level == 1 && option & option::PE != 0 {
                    return Ok((FieldNode::new(name, level, NodeKind::PeriodGroup), None));
                }
                let field_type = match format {
                    b'A' => long_variant(
                        *option2,
                        FieldType::String,
                        FieldType::LAString,
                        FieldType::LBString,
                    ),
                    b'W' => long_variant(
                        *option2,
                        FieldType::Unicode,
                        FieldType::LAUnicode,
                        FieldType::LBUnicode,
                    ),
                    b'P' => FieldType::Packed,
                    b'U' => FieldType::Unpacked,
                    b'B' => FieldType::integer(true, *length),
                    b'F' => FieldType::integer(false, *length),
                    b'G' if *length == 4 || *length == 8 => FieldType::Float,
                    b'G' => return Err(GenericError::invalid_float_length(*length).into()),
                    b' ' => return Ok((FieldNode::new(name, level, NodeKind::Group), None)),
                    other => return Err(GenericError::unknown_format(*other).into()),
                };
                let leaf = Leaf {
                    field_type,
                    length: *length,
                    options: leaf_options(*option, *option2),
                    sys_function: *sys_function,
                    edit_mask: *edit_mask,
                    sub_option: *sub_option,
                };
                if option & option::MU != 0 {
                    let value = FieldNode::new(name.clone(), level + 1, NodeKind::Leaf(leaf));
                    return Ok((
                        FieldNode::new(name, level, NodeKind::MultipleValue),
                        Some(value),
                    ));
                }
                FieldNode::new(name, level, NodeKind::Leaf(leaf))
            }
            EntryBody::Descriptor {
                kind,
                format,
                option,
                length,
                ranges,
                ..
            } => FieldNode::new(
                name,
                1,
                NodeKind::SuperDescriptor(SuperDescriptor {
                    kind: *kind,
                    format: *format,
                    length: u32::from(*length),
                    options: map_bits(
                        *option,
                        &[
                            (option::UQ, FieldOptions::UQ),
                            (option::PE, FieldOptions::PE),
                            (option::NU, FieldOptions::NU),
                            (option::MU, FieldOptions::MU),
                        ],
                    ),
                    entries: ranges
                        .iter()
                        .map(|r| SubEntry {
                            name: name_string(&r.name),
                            from: r.from,
                            to: r.to,
                        })
                        .collect(),
                }),
            ),
            EntryBody::Phonetic { length, parent, .. } => FieldNode::new(
                name,
                1,
                NodeKind::Phonetic(Phonetic {
                    length: *length,
                    parent: name_string(parent),
                }),
            ),
            EntryBody::Collation {
                option,
                length,
                parent,
                option2,
                attribute,
                ..
            } => {
                let mut options = map_bits(
                    *option,
                    &[
                        (option::UQ, FieldOptions::UQ),
                        (option::PE, FieldOptions::PE),
                        (option::NU, FieldOptions::NU),
                        (option::MU, FieldOptions::MU),
                    ],
                );
                if option & (option::UQ | option::SB) == 0 {
                    options.insert(FieldOptions::HE);
                }
                if option2 & 0x04 == 0 {
                    options.insert(FieldOptions::LA);
                }
                if option2 & 0x08 == 0 {
                    options.insert(FieldOptions::LB);
                }
                if option2 & 0x80 == 0 {
                    options.insert(FieldOptions::COL_EXIT);
                }
                FieldNode::new(
                    name,
                    1,
                    NodeKind::Collation(Collation {
                        length: *length,
                        parent: name_string(parent),
                        attribute: String::from_utf8_lossy(attribute).into_owned(),
                        options,
                    }),
                )
            }
            EntryBody::HyperExit {
                format,
                option,
                length,
                exit,
                parents,
                ..
            } => FieldNode::new(
                name,
                1,
                NodeKind::HyperExit(HyperExit {
                    length: u32::from(*length),
                    format: *format,
                    exit: *exit,
                    parents: parents.iter().map(name_string).collect(),
                    options: map_bits(
                        *option,
                        &[
                            (option::UQ, FieldOptions::UQ),
                            (option::PH, FieldOptions::HE),
                            (option::PE, FieldOptions::PE),
                            (option::NU, FieldOptions::NU),
                            (option::MU, FieldOptions::MU),
                        ],
                    ),
                }),
            ),
            EntryBody::Referential {
                file,
                primary_key,
                foreign_key,
                ref_type,
                update_action,
                delete_action,
            } => FieldNode::new(
                name,
                1,
                NodeKind::Referential(Referential {
                    file: *file,
                    primary_key: name_string(primary_key),
                    foreign_key: name_string(foreign_key),
                    ref_type: *ref_type,
                    update_action: ReferentialAction::from_u8(*update_action),
                    delete_action: ReferentialAction::from_u8(*delete_action),
                }),
            ),
        };
        Ok((node, None))
    }
}

/// Decoded field definition table of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fdt {
    /// Table header.
    pub header: FdtHeader,
    /// Entries in table order.
    pub entries: Vec<FdtEntry>,
    /// Bytes after the last entry, kept so the table writes back unchanged.
    pub trailer: Vec<u8>,
}

impl Fdt {
    /// Decodes a table in host byte order, as returned by the database.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, Endian::host())
    }

    /// Decodes a table in the given byte order.
    ///
    /// Reads up to the announced entry count and stops early at an entry
    /// identifier of zero.
    pub fn parse_with(data: &[u8], order: Endian) -> Result<Self> {
        let mut d = Decoder::new(data, order);
        let header = FdtHeader {
            length: d.get_u32()?,
            structure_level: d.get_u8()?,
            flag: d.get_u8()?,
            count: d.get_u16()?,
            time: d.get_u64()?,
        };
        let mut entries = Vec::with_capacity(usize::from(header.count));
        for _ in 0..header.count {
            let start = d.position();
            if d.remaining() == 0 || data[start] == 0 {
                break;
            }
            let id = d.get_u8()?;
            let length = d.get_u8()?;
            if length < 4 {
                return Err(GenericError::short_read(format!(
                    "FDT entry at offset {} declares length {}",
                    start, length
                ))
                .into());
            }
            let body = d.get_slice(usize::from(length) - 2)?;
            let mut entry_decoder = Decoder::new(body, order);
            entries.push(FdtEntry::decode(id, length, &mut entry_decoder)?);
        }
        let trailer = data[d.position()..].to_vec();
        tracing::trace!(
            count = header.count,
            parsed = entries.len(),
            trailer = trailer.len(),
            "FDT decoded"
        );
        Ok(Self {
            header,
            entries,
            trailer,
        })
    }

    /// Encodes the table in host byte order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(Endian::host())
    }

    /// Encodes the table in the given byte order.
    ///
    /// Each entry is padded with zeros to its declared length; an entry
    /// whose content is longer than declared is written with its content
    /// length instead. Entries longer than 255 bytes fail with code 14.
    pub fn to_bytes_with(&self, order: Endian) -> Result<Vec<u8>> {
        let mut out = BytesMut::with_capacity(self.header.length as usize);
        let mut e = Encoder::new(&mut out, order);
        e.put_u32(self.header.length);
        e.put_u8(self.header.structure_level);
        e.put_u8(self.header.flag);
        e.put_u16(self.header.count);
        e.put_u64(self.header.time);

        for entry in &self.entries {
            let mut body = BytesMut::new();
            entry.encode(&mut Encoder::new(&mut body, order))?;
            let length = usize::from(entry.length).max(body.len() + 2);
            e.put_u8(entry.identifier());
            e.put_u8(entry.count("entry length", length)?);
            e.put_slice(&body);
            e.put_zeros(length - 2 - body.len());
        }
        e.put_slice(&self.trailer);
        Ok(out.to_vec())
    }

    /// Builds the field tree.
    ///
    /// A field attaches to the nearest open group, periodic group or
    /// multi-value field one level above it and becomes a top-level node when there is none.
    /// Descriptors are always top-level.
    pub fn definition(&self) -> Result<Definition> {
        let mut definition = Definition::new();
        definition.file_time = self.header.time;
        let mut open: Vec<NodeId> = Vec::new();

        for entry in &self.entries {
            let (node, value) = entry.to_nodes()?;
            let level = node.level;
            let structure = matches!(
                node.kind,
                NodeKind::Group | NodeKind::PeriodGroup | NodeKind::MultipleValue
            );
            let id = definition.add(node);
            loop {
                match open.last() {
                    Some(top) if definition.node(*top).level + 1 == level => {
                        definition.add_child(*top, id);
                        break;
                    }
                    Some(_) => {
                        open.pop();
                    }
                    None => {
                        definition.append_root(id);
                        break;
                    }
                }
            }
            if let Some(value) = value {
                let value = definition.add(value);
                definition.add_child(id, value);
            }
            if structure {
                open.push(id);
            }
            definition.register(id);
        }
        definition.init_references();
        tracing::debug!(
            nodes = definition.len(),
            roots = definition.roots().len(),
            "field definition created"
        );
        Ok(definition)
    }
}

fn name_string(name: &[u8; 2]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn long_variant(option2: u8, plain: FieldType, la: FieldType, lb: FieldType) -> FieldType {
    if option2 & option2::LA != 0 {
        la
    } else if option2 & option2::LB != 0 {
        lb
    } else {
        plain
    }
}

fn map_bits(value: u8, table: &[(u8, FieldOptions)]) -> FieldOptions {
    let mut options = FieldOptions::empty();
    for (bit, o) in table {
        if value & bit != 0 {
            options.insert(*o);
        }
    }
    options
}

fn leaf_options(option: u8, option2: u8) -> FieldOptions {
    map_bits(
        option,
        &[
            (option::UQ, FieldOptions::UQ),
            (option::NU, FieldOptions::NU),
            (option::FI, FieldOptions::FI),
            (option::DE, FieldOptions::DE),
            (option::MU, FieldOptions::MU),
        ],
    ) | map_bits(
        option2,
        &[
            (option2::NC, FieldOptions::NC),
            (option2::NN, FieldOptions::NN),
            (option2::HF, FieldOptions::HF),
            (option2::NV, FieldOptions::NV),
            (option2::NB, FieldOptions::NB),
        ],
    )
}
