//! Typed field tree of a file definition.
//!
//! Nodes live in an arena owned by [`Definition`] and refer to each other
//! by [`NodeId`]. Structures (groups, periodic groups, multi-value fields,
//! redefinitions) have children; leaves and descriptors do not.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;

/// Concrete type of a leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Signed one byte integer.
    Byte,
    /// Unsigned one byte integer.
    UByte,
    /// Signed two byte integer.
    Int2,
    /// Unsigned two byte integer.
    UInt2,
    /// Signed four byte integer.
    Int4,
    /// Unsigned four byte integer.
    UInt4,
    /// Signed eight byte integer.
    Int8,
    /// Unsigned eight byte integer.
    UInt8,
    /// Binary of any other width.
    ByteArray,
    /// Alphanumeric with a one byte length prefix when variable.
    String,
    /// Alphanumeric with a two byte length prefix.
    LAString,
    /// Alphanumeric with a four byte length prefix.
    LBString,
    /// Wide character with a one byte length prefix when variable.
    Unicode,
    /// Wide character with a two byte length prefix.
    LAUnicode,
    /// Wide character with a four byte length prefix.
    LBUnicode,
    /// Packed decimal.
    Packed,
    /// Unpacked (zoned) decimal.
    Unpacked,
    /// Floating point.
    Float,
}

impl FieldType {
    /// Integer type of the given width, byte array for other widths.
    pub fn integer(unsigned: bool, length: u32) -> Self {
        match (length, unsigned) {
            (1, true) => FieldType::UByte,
            (1, false) => FieldType::Byte,
            (2, true) => FieldType::UInt2,
            (2, false) => FieldType::Int2,
            (4, true) => FieldType::UInt4,
            (4, false) => FieldType::Int4,
            (8, true) => FieldType::UInt8,
            (8, false) => FieldType::Int8,
            _ => FieldType::ByteArray,
        }
    }

    /// Format character as written in a format buffer.
    pub fn format_char(&self) -> char {
        match self {
            FieldType::String | FieldType::LAString | FieldType::LBString => 'A',
            FieldType::Unicode | FieldType::LAUnicode | FieldType::LBUnicode => 'W',
            FieldType::UByte
            | FieldType::UInt2
            | FieldType::UInt4
            | FieldType::UInt8
            | FieldType::ByteArray => 'B',
            FieldType::Byte | FieldType::Int2 | FieldType::Int4 | FieldType::Int8 => 'F',
            FieldType::Packed => 'P',
            FieldType::Unpacked => 'U',
            FieldType::Float => 'G',
        }
    }
}

/// Set of field options.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldOptions(u32);

impl FieldOptions {
    /// Unique descriptor.
    pub const UQ: FieldOptions = FieldOptions(1 << 0);
    /// Null value suppression.
    pub const NU: FieldOptions = FieldOptions(1 << 1);
    /// Fixed storage.
    pub const FI: FieldOptions = FieldOptions(1 << 2);
    /// Descriptor.
    pub const DE: FieldOptions = FieldOptions(1 << 3);
    /// SQL null value allowed.
    pub const NC: FieldOptions = FieldOptions(1 << 4);
    /// SQL not null.
    pub const NN: FieldOptions = FieldOptions(1 << 5);
    /// High order byte first.
    pub const HF: FieldOptions = FieldOptions(1 << 6);
    /// Not converted.
    pub const NV: FieldOptions = FieldOptions(1 << 7);
    /// No blank compression.
    pub const NB: FieldOptions = FieldOptions(1 << 8);
    /// Hyperexit descriptor.
    pub const HE: FieldOptions = FieldOptions(1 << 9);
    /// Periodic group member.
    pub const PE: FieldOptions = FieldOptions(1 << 10);
    /// Multiple value field.
    pub const MU: FieldOptions = FieldOptions(1 << 11);
    /// Long alphanumeric.
    pub const LA: FieldOptions = FieldOptions(1 << 12);
    /// Large object.
    pub const LB: FieldOptions = FieldOptions(1 << 13);
    /// Collation exit.
    pub const COL_EXIT: FieldOptions = FieldOptions(1 << 14);
    /// Phonetic source.
    pub const PH: FieldOptions = FieldOptions(1 << 15);

    /// Options listed in definitions, in display order.
    const LISTED: [(FieldOptions, &'static str); 12] = [
        (Self::UQ, "UQ"),
        (Self::NU, "NU"),
        (Self::FI, "FI"),
        (Self::DE, "DE"),
        (Self::NC, "NC"),
        (Self::NN, "NN"),
        (Self::HF, "HF"),
        (Self::NV, "NV"),
        (Self::NB, "NB"),
        (Self::HE, "HE"),
        (Self::PE, "PE"),
        (Self::MU, "MU"),
    ];

    /// No options set.
    pub const fn empty() -> Self {
        FieldOptions(0)
    }

    /// Whether every option in `other` is set.
    pub fn contains(&self, other: FieldOptions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the options in `other`.
    pub fn insert(&mut self, other: FieldOptions) {
        self.0 |= other.0;
    }

    /// Whether no option is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bit set.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Names of the listed options that are set.
    pub fn names(&self) -> Vec<&'static str> {
        Self::LISTED
            .iter()
            .filter(|(o, _)| self.contains(*o))
            .map(|(_, n)| *n)
            .collect()
    }
}

impl std::ops::BitOr for FieldOptions {
    type Output = FieldOptions;

    fn bitor(self, rhs: FieldOptions) -> FieldOptions {
        FieldOptions(self.0 | rhs.0)
    }
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldOptions({})", self)
    }
}

/// Space separated option names, e.g. `NU DE`.
impl fmt::Display for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(" "))
    }
}

/// Attributes of a leaf field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Concrete value type.
    pub field_type: FieldType,
    /// Declared length; zero means variable length.
    pub length: u32,
    /// Field options.
    pub options: FieldOptions,
    /// System field function (`SY=`), zero for none.
    pub sys_function: u8,
    /// Date/time edit mask (`DT=`), zero for none.
    pub edit_mask: u8,
    /// Further option bits, passed through.
    pub sub_option: u8,
}

impl Leaf {
    fn option_text(&self) -> String {
        let mut parts: Vec<&str> = self.options.names();
        match self.sys_function {
            1 => parts.push("SY=TIME"),
            2 => parts.push("SY=SESSIONID"),
            3 => parts.push("SY=OPUSER"),
            _ => {}
        }
        match self.edit_mask {
            1 => parts.push("DT=E(DATE)"),
            2 => parts.push("DT=E(TIME)"),
            3 => parts.push("DT=E(DATETIME)"),
            4 => parts.push("DT=E(TIMESTAMP)"),
            5 => parts.push("DT=E(NATDATE)"),
            6 => parts.push("DT=E(NATTIME)"),
            7 => parts.push("DT=E(UNIXTIME)"),
            8 => parts.push("DT=E(XTIMESTAMP)"),
            _ => {}
        }
        parts.join(",")
    }
}

/// Whether a sub/super descriptor was declared as sub or super.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Built from parts of one field.
    Sub,
    /// Built from parts of several fields.
    Super,
}

/// Byte range of a source field taking part in a sub/super descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntry {
    /// Source field name.
    pub name: String,
    /// First byte, one based.
    pub from: u16,
    /// Last byte, inclusive.
    pub to: u16,
}

/// Sub or super descriptor built from byte ranges of other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperDescriptor {
    /// Sub or super.
    pub kind: DescriptorKind,
    /// Format character of the descriptor value.
    pub format: u8,
    /// Length of the descriptor value.
    pub length: u32,
    /// Descriptor options.
    pub options: FieldOptions,
    /// Source ranges, in order.
    pub entries: Vec<SubEntry>,
}

/// Phonetic descriptor over an alphanumeric field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phonetic {
    /// Value length.
    pub length: u16,
    /// Source field name.
    pub parent: String,
}

/// Collation descriptor over an alphanumeric field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation {
    /// Value length.
    pub length: u16,
    /// Source field name.
    pub parent: String,
    /// Collation attribute text.
    pub attribute: String,
    /// Descriptor options.
    pub options: FieldOptions,
}

/// Descriptor computed by a user hyperexit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperExit {
    /// Value length.
    pub length: u32,
    /// Format character of the descriptor value.
    pub format: u8,
    /// Hyperexit number.
    pub exit: u8,
    /// Source field names.
    pub parents: Vec<String>,
    /// Descriptor options.
    pub options: FieldOptions,
}

/// Referential action on update or delete of the primary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    /// Reject the change.
    NoAction,
    /// Apply the change to dependent records.
    Cascade,
    /// Clear the foreign key.
    Nullify,
    /// Unknown action code.
    Other(u8),
}

impl ReferentialAction {
    /// Decodes an action code.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => ReferentialAction::NoAction,
            1 => ReferentialAction::Cascade,
            2 => ReferentialAction::Nullify,
            other => ReferentialAction::Other(other),
        }
    }

    /// Wire action code.
    pub fn as_u8(self) -> u8 {
        match self {
            ReferentialAction::NoAction => 0,
            ReferentialAction::Cascade => 1,
            ReferentialAction::Nullify => 2,
            ReferentialAction::Other(v) => v,
        }
    }

    fn letter(self) -> Option<char> {
        match self {
            ReferentialAction::NoAction => Some('X'),
            ReferentialAction::Cascade => Some('C'),
            ReferentialAction::Nullify => Some('N'),
            ReferentialAction::Other(_) => None,
        }
    }
}

/// Referential constraint between two files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referential {
    /// Primary file number.
    pub file: u32,
    /// Primary key field name.
    pub primary_key: String,
    /// Foreign key field name.
    pub foreign_key: String,
    /// Constraint type code.
    pub ref_type: u8,
    /// Action on update of the primary record.
    pub update_action: ReferentialAction,
    /// Action on delete of the primary record.
    pub delete_action: ReferentialAction,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Value field.
    Leaf(Leaf),
    /// Group of fields.
    Group,
    /// Periodic group.
    PeriodGroup,
    /// Multi-value field; its single child is the value leaf.
    MultipleValue,
    /// Alternative layout of a field as a list of parts.
    Redefinition,
    /// Sub or super descriptor.
    SuperDescriptor(SuperDescriptor),
    /// Phonetic descriptor.
    Phonetic(Phonetic),
    /// Collation descriptor.
    Collation(Collation),
    /// Hyperexit descriptor.
    HyperExit(HyperExit),
    /// Referential constraint.
    Referential(Referential),
}

impl NodeKind {
    /// Whether the node can have children.
    pub fn is_structure(&self) -> bool {
        matches!(
            self,
            NodeKind::Group | NodeKind::PeriodGroup | NodeKind::MultipleValue | NodeKind::Redefinition
        )
    }

    /// Whether the node is a derived descriptor.
    pub fn is_descriptor(&self) -> bool {
        matches!(
            self,
            NodeKind::SuperDescriptor(_)
                | NodeKind::Phonetic(_)
                | NodeKind::Collation(_)
                | NodeKind::HyperExit(_)
                | NodeKind::Referential(_)
        )
    }
}

/// Index of a node inside its [`Definition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One node of the field tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    /// Two-character name from the file definition.
    pub short_name: String,
    /// Long name; equals the short name unless renamed.
    pub name: String,
    /// Level number, one for roots.
    pub level: u8,
    /// What the node is.
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Nodes named by a descriptor's source or parent fields.
    references: Vec<NodeId>,
    in_period: bool,
    in_multiple: bool,
}

impl FieldNode {
    /// Detached node named `short_name`.
    pub fn new(short_name: impl Into<String>, level: u8, kind: NodeKind) -> Self {
        let short_name = short_name.into();
        Self {
            name: short_name.clone(),
            short_name,
            level,
            kind,
            parent: None,
            children: Vec::new(),
            references: Vec::new(),
            in_period: false,
            in_multiple: false,
        }
    }

    /// Enclosing structure, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Nodes a descriptor derives from.
    pub fn references(&self) -> &[NodeId] {
        &self.references
    }

    /// Whether the node sits inside a periodic group.
    pub fn in_period(&self) -> bool {
        self.in_period
    }

    /// Whether the node is or sits inside a multi-value field.
    pub fn in_multiple(&self) -> bool {
        self.in_multiple
    }

    /// Whether the node can have children.
    pub fn is_structure(&self) -> bool {
        self.kind.is_structure()
    }

    /// Declared length of leaves and descriptors; zero for structures.
    pub fn length(&self) -> u32 {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.length,
            NodeKind::SuperDescriptor(s) => s.length,
            NodeKind::Phonetic(p) => u32::from(p.length),
            NodeKind::Collation(c) => u32::from(c.length),
            NodeKind::HyperExit(h) => h.length,
            _ => 0,
        }
    }

    /// Options of the node, including the implied PE and MU of structures.
    pub fn options(&self) -> FieldOptions {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.options,
            NodeKind::PeriodGroup => FieldOptions::PE,
            NodeKind::MultipleValue => FieldOptions::MU,
            NodeKind::SuperDescriptor(s) => s.options,
            NodeKind::Collation(c) => c.options,
            NodeKind::HyperExit(h) => h.options,
            _ => FieldOptions::empty(),
        }
    }
}

/// Field tree of one file plus a name index.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    nodes: Vec<FieldNode>,
    roots: Vec<NodeId>,
    names: HashMap<String, NodeId>,
    /// Timestamp of the file definition.
    pub file_time: u64,
}

impl Definition {
    /// Empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detached node to the arena.
    pub fn add(&mut self, node: FieldNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Makes `id` a top-level node.
    pub fn append_root(&mut self, id: NodeId) {
        self.nodes[id.0].parent = None;
        self.roots.push(id);
    }

    /// Appends `child` to the children of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Indexes the node under its short and long name.
    pub fn register(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        self.names.insert(node.short_name.clone(), id);
        if node.name != node.short_name {
            self.names.insert(node.name.clone(), id);
        }
    }

    /// Gives a node a long name; both names stay searchable.
    pub fn rename(&mut self, short_name: &str, name: &str) -> Option<NodeId> {
        let id = self.search_id(short_name)?;
        self.nodes[id.0].name = name.to_string();
        self.names.insert(name.to_string(), id);
        Some(id)
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &FieldNode {
        &self.nodes[id.0]
    }

    /// Level one nodes in order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the definition has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id of the node named `name`, short or long.
    pub fn search_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Node registered under a short or long name.
    pub fn search(&self, name: &str) -> Option<&FieldNode> {
        self.search_id(name).map(|id| self.node(id))
    }

    /// Registered names, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Adds a redefinition of `field` made of the given parts.
    ///
    /// The redefinition is attached next to the field, and every part is
    /// registered under its own name.
    pub fn add_redefinition(&mut self, field: &str, name: &str, parts: Vec<(String, Leaf)>) -> Option<NodeId> {
        let target = self.search_id(field)?;
        let level = self.node(target).level;
        let id = self.add(FieldNode::new(name, level, NodeKind::Redefinition));
        match self.node(target).parent {
            Some(parent) => self.add_child(parent, id),
            None => self.append_root(id),
        }
        self.register(id);
        for (part_name, leaf) in parts {
            let part = self.add(FieldNode::new(part_name, level + 1, NodeKind::Leaf(leaf)));
            self.add_child(id, part);
            self.register(part);
        }
        self.init_references();
        Some(id)
    }

    /// Depth-first walk in definition order.
    ///
    /// The callback gets each node and its depth (roots are depth 1) and
    /// may stop the walk with [`ControlFlow::Break`].
    pub fn traverse<F>(&self, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &FieldNode, usize) -> ControlFlow<()>,
    {
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().rev().map(|id| (*id, 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            f(id, node, depth)?;
            stack.extend(node.children.iter().rev().map(|c| (*c, depth + 1)));
        }
        ControlFlow::Continue(())
    }

    /// Sets parent links and levels from the tree shape, inherits the
    /// periodic and multi-value flags, and resolves descriptor references.
    pub fn init_references(&mut self) {
        let mut order = Vec::with_capacity(self.nodes.len());
        let _ = self.traverse(|id, _, depth| {
            order.push((id, depth));
            ControlFlow::Continue(())
        });
        for (id, depth) in order {
            let parent = self.nodes[id.0].parent;
            let (parent_period, parent_multiple) = parent
                .map(|p| {
                    let p = &self.nodes[p.0];
                    (
                        p.in_period || matches!(p.kind, NodeKind::PeriodGroup),
                        p.in_multiple,
                    )
                })
                .unwrap_or((false, false));
            let node = &mut self.nodes[id.0];
            if !node.kind.is_descriptor() {
                node.level = depth as u8;
            }
            node.in_period = parent_period;
            node.in_multiple = parent_multiple || matches!(node.kind, NodeKind::MultipleValue);
        }

        for index in 0..self.nodes.len() {
            let sources: Vec<&str> = match &self.nodes[index].kind {
                NodeKind::SuperDescriptor(s) => s.entries.iter().map(|e| e.name.as_str()).collect(),
                NodeKind::Phonetic(p) => vec![p.parent.as_str()],
                NodeKind::Collation(c) => vec![c.parent.as_str()],
                NodeKind::HyperExit(h) => h.parents.iter().map(String::as_str).collect(),
                NodeKind::Referential(r) => vec![r.primary_key.as_str(), r.foreign_key.as_str()],
                _ => continue,
            };
            let references = sources
                .into_iter()
                .filter_map(|name| {
                    let found = self.names.get(name).copied();
                    if found.is_none() {
                        tracing::debug!(
                            descriptor = %self.nodes[index].short_name,
                            source = name,
                            "descriptor source not in definition"
                        );
                    }
                    found
                })
                .collect();
            self.nodes[index].references = references;
        }
    }

    /// Formatter for one node.
    pub fn display(&self, id: NodeId) -> NodeDisplay<'_> {
        NodeDisplay {
            definition: self,
            id,
        }
    }
}

/// One line per node, indented by level.
impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut result = Ok(());
        let _ = self.traverse(|id, _, _| match writeln!(f, "{}", self.display(id)) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                result = Err(e);
                ControlFlow::Break(())
            }
        });
        result
    }
}

/// Definition-style rendering of a node.
pub struct NodeDisplay<'a> {
    definition: &'a Definition,
    id: NodeId,
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.definition.node(self.id);
        let indent = " ".repeat(usize::from(node.level));
        match &node.kind {
            NodeKind::Leaf(leaf) => {
                let options = leaf.option_text();
                let options = if options.is_empty() {
                    String::new()
                } else {
                    format!(",{}", options)
                };
                write!(
                    f,
                    "{}{}, {}, {}, {} {} ; {}",
                    indent,
                    node.level,
                    node.short_name,
                    leaf.length,
                    leaf.field_type.format_char(),
                    options,
                    node.name
                )
            }
            NodeKind::MultipleValue => {
                let leaf = node.children.first().and_then(|c| match &self.definition.node(*c).kind {
                    NodeKind::Leaf(leaf) => Some(leaf),
                    _ => None,
                });
                match leaf {
                    Some(leaf) => {
                        let options = leaf.option_text();
                        let options = if options.is_empty() {
                            "MU".to_string()
                        } else {
                            options
                        };
                        write!(
                            f,
                            "{}{}, {}, {}, {} ,{}; {}",
                            indent,
                            node.level,
                            node.short_name,
                            leaf.length,
                            leaf.field_type.format_char(),
                            options,
                            node.name
                        )
                    }
                    None => write!(f, "{}{} {} deleted", indent, node.level, node.short_name),
                }
            }
            NodeKind::Group | NodeKind::Redefinition => write!(
                f,
                "{}{}, {}  ; {}",
                indent, node.level, node.short_name, node.name
            ),
            NodeKind::PeriodGroup => write!(
                f,
                "{}{}, {} ,PE ; {}",
                indent, node.level, node.short_name, node.name
            ),
            NodeKind::SuperDescriptor(s) => {
                if node.short_name == node.name {
                    write!(f, "{}=", node.short_name)?;
                } else {
                    write!(f, "{}[{}] =", node.name, node.short_name)?;
                }
                let entries: Vec<String> = s
                    .entries
                    .iter()
                    .map(|e| format!("{}({},{})", e.name, e.from, e.to))
                    .collect();
                write!(f, "{} ; {}", entries.join(","), node.name)
            }
            NodeKind::Phonetic(p) => write!(
                f,
                "{}=PHON({}) ; {}",
                node.short_name, p.parent, node.name
            ),
            NodeKind::Collation(c) => {
                let mut options = "";
                if c.options.contains(FieldOptions::LA) {
                    options = ",LA";
                } else if c.options.contains(FieldOptions::LB) {
                    options = ",L4";
                }
                if c.options.contains(FieldOptions::HE) {
                    options = ",HE";
                }
                if c.options.contains(FieldOptions::UQ) {
                    options = ",UQ";
                }
                write!(
                    f,
                    "{}{}=COLLATING({},{}) ; {}",
                    node.short_name, options, c.parent, c.attribute, node.name
                )
            }
            NodeKind::HyperExit(h) => {
                let options: String = h.options.names().iter().map(|n| format!(",{}", n)).collect();
                write!(
                    f,
                    "{} {} {}{}=HYPER({},{}) ; {}",
                    node.short_name,
                    h.length,
                    h.format as char,
                    options,
                    h.exit,
                    h.parents.join(","),
                    node.name
                )
            }
            NodeKind::Referential(r) => {
                write!(
                    f,
                    "{}=REFINT({},{},{}",
                    node.short_name, r.foreign_key, r.file, r.primary_key
                )?;
                if let Some(c) = r.delete_action.letter() {
                    write!(f, "/D{}", c)?;
                }
                if let Some(c) = r.update_action.letter() {
                    write!(f, ",U{}", c)?;
                }
                write!(f, ") ; {}", node.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(field_type: FieldType, length: u32, options: FieldOptions) -> NodeKind {
        NodeKind::Leaf(Leaf {
            field_type,
            length,
            options,
            sys_function: 0,
            edit_mask: 0,
            sub_option: 0,
        })
    }

    /// AA (A8) ; AB group { AC, AD MU } ; AQ PE { AR }
    fn sample() -> Definition {
        let mut def = Definition::new();
        let aa = def.add(FieldNode::new("AA", 1, leaf(FieldType::String, 8, FieldOptions::UQ | FieldOptions::DE)));
        def.append_root(aa);
        let ab = def.add(FieldNode::new("AB", 1, NodeKind::Group));
        def.append_root(ab);
        let ac = def.add(FieldNode::new("AC", 2, leaf(FieldType::Packed, 4, FieldOptions::NU)));
        def.add_child(ab, ac);
        let ad = def.add(FieldNode::new("AD", 2, NodeKind::MultipleValue));
        def.add_child(ab, ad);
        let ad_value = def.add(FieldNode::new("AD", 3, leaf(FieldType::Unicode, 20, FieldOptions::MU)));
        def.add_child(ad, ad_value);
        let aq = def.add(FieldNode::new("AQ", 1, NodeKind::PeriodGroup));
        def.append_root(aq);
        let ar = def.add(FieldNode::new("AR", 2, leaf(FieldType::UInt4, 4, FieldOptions::empty())));
        def.add_child(aq, ar);
        for id in [aa, ab, ac, ad, aq, ar] {
            def.register(id);
        }
        let h1 = def.add(FieldNode::new(
            "H1",
            1,
            NodeKind::SuperDescriptor(SuperDescriptor {
                kind: DescriptorKind::Super,
                format: b'A',
                length: 6,
                options: FieldOptions::NU,
                entries: vec![
                    SubEntry { name: "AA".into(), from: 1, to: 2 },
                    SubEntry { name: "AC".into(), from: 1, to: 4 },
                ],
            }),
        ));
        def.append_root(h1);
        def.register(h1);
        def.init_references();
        def
    }

    #[test]
    fn test_integer_types() {
        assert_eq!(FieldType::integer(true, 4), FieldType::UInt4);
        assert_eq!(FieldType::integer(false, 2), FieldType::Int2);
        assert_eq!(FieldType::integer(true, 3), FieldType::ByteArray);
        assert_eq!(FieldType::integer(false, 8).format_char(), 'F');
    }

    #[test]
    fn test_option_names() {
        let options = FieldOptions::DE | FieldOptions::UQ | FieldOptions::LA;
        assert_eq!(options.to_string(), "UQ DE");
        assert!(options.contains(FieldOptions::LA));
        assert!(!options.contains(FieldOptions::MU));
    }

    #[test]
    fn test_search_and_tree() {
        let def = sample();
        let ab = def.search_id("AB").unwrap();
        assert_eq!(def.node(ab).children().len(), 2);
        let ac = def.search("AC").unwrap();
        assert_eq!(ac.parent(), Some(ab));
        assert_eq!(ac.length(), 4);
        assert!(def.search("ZZ").is_none());
        assert_eq!(def.roots().len(), 4);
    }

    #[test]
    fn test_flags_are_inherited() {
        let def = sample();
        assert!(def.search("AR").unwrap().in_period());
        assert!(!def.search("AC").unwrap().in_period());
        let ad = def.search_id("AD").unwrap();
        let value = def.node(ad).children()[0];
        assert!(def.node(value).in_multiple());
        assert_eq!(def.node(value).level, 3);
    }

    #[test]
    fn test_references_resolved() {
        let def = sample();
        let h1 = def.search("H1").unwrap();
        let refs: Vec<&str> = h1
            .references()
            .iter()
            .map(|id| def.node(*id).short_name.as_str())
            .collect();
        assert_eq!(refs, vec!["AA", "AC"]);
    }

    #[test]
    fn test_rename() {
        let mut def = sample();
        def.rename("AA", "PERSONNEL-ID").unwrap();
        assert_eq!(def.search("PERSONNEL-ID").unwrap().short_name, "AA");
        assert_eq!(def.search("AA").unwrap().name, "PERSONNEL-ID");
        assert!(def.rename("ZZ", "NOPE").is_none());
    }

    #[test]
    fn test_traverse_order_and_break() {
        let def = sample();
        let mut seen = Vec::new();
        let _ = def.traverse(|_, node, depth| {
            seen.push((node.short_name.clone(), depth));
            ControlFlow::Continue(())
        });
        let names: Vec<&str> = seen.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["AA", "AB", "AC", "AD", "AD", "AQ", "AR", "H1"]);
        assert_eq!(seen[2].1, 2);

        let mut count = 0;
        let flow = def.traverse(|_, _, _| {
            count += 1;
            if count == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(flow.is_break());
        assert_eq!(count, 3);
    }

    #[test]
    fn test_display_forms() {
        let def = sample();
        let show = |name: &str| def.display(def.search_id(name).unwrap()).to_string();
        assert_eq!(show("AA"), " 1, AA, 8, A ,UQ,DE ; AA");
        assert_eq!(show("AB"), " 1, AB  ; AB");
        assert_eq!(show("AD"), "  2, AD, 20, W ,MU; AD");
        assert_eq!(show("AQ"), " 1, AQ ,PE ; AQ");
        assert_eq!(show("H1"), "H1=AA(1,2),AC(1,4) ; H1");
        assert_eq!(def.to_string().lines().count(), 8);
    }

    #[test]
    fn test_descriptor_display() {
        let mut def = Definition::new();
        let kinds = [
            (
                "PH",
                NodeKind::Phonetic(Phonetic {
                    length: 20,
                    parent: "AE".into(),
                }),
                "PH=PHON(AE) ; PH",
            ),
            (
                "CN",
                NodeKind::Collation(Collation {
                    length: 1144,
                    parent: "BC".into(),
                    attribute: "'de@collation=phonebook',PRIMARY".into(),
                    options: FieldOptions::NU | FieldOptions::HE | FieldOptions::LA,
                }),
                "CN,HE=COLLATING(BC,'de@collation=phonebook',PRIMARY) ; CN",
            ),
            (
                "HY",
                NodeKind::HyperExit(HyperExit {
                    length: 20,
                    format: b'A',
                    exit: 1,
                    parents: vec!["AA".into(), "AC".into()],
                    options: FieldOptions::NU | FieldOptions::MU,
                }),
                "HY 20 A,NU,MU=HYPER(1,AA,AC) ; HY",
            ),
            (
                "HO",
                NodeKind::Referential(Referential {
                    file: 12,
                    primary_key: "AA".into(),
                    foreign_key: "AC".into(),
                    ref_type: 1,
                    update_action: ReferentialAction::Cascade,
                    delete_action: ReferentialAction::NoAction,
                }),
                "HO=REFINT(AC,12,AA/DX,UC) ; HO",
            ),
        ];
        for (name, kind, expected) in kinds {
            let id = def.add(FieldNode::new(name, 1, kind));
            def.append_root(id);
            assert_eq!(def.display(id).to_string(), expected);
        }
    }

    #[test]
    fn test_redefinition() {
        let mut def = sample();
        let part = |length| Leaf {
            field_type: FieldType::String,
            length,
            options: FieldOptions::empty(),
            sys_function: 0,
            edit_mask: 0,
            sub_option: 0,
        };
        let id = def
            .add_redefinition("AA", "AA-PARTS", vec![("A1".into(), part(4)), ("A2".into(), part(4))])
            .unwrap();
        assert_eq!(def.node(id).children().len(), 2);
        assert_eq!(def.search("A2").unwrap().parent(), Some(id));
        assert!(def.add_redefinition("ZZ", "X", Vec::new()).is_none());
    }
}
