//! Recover the bundled stdlib version from `kotlin/KotlinVersion.class`.
//!
//! The class is never loaded or linked anywhere. Its bytes are parsed into a
//! constant pool that lives only for the duration of [`read_current_version`],
//! and the static initializer is walked just far enough to see which integers
//! are handed to the class's own constructor before they are stored into the
//! `CURRENT` field. Newer stdlibs assign `CURRENT` from a static factory on a
//! helper class; that class is read from the same archive into its own pool and
//! the factory body is walked the same way.

use thiserror::Error;

use crate::archive::PluginArchive;
use crate::library::{VERSION_MARKER_CLASS, VERSION_MARKER_FIELD};
use crate::version::Version;

/// Reads the family version bundled inside a plugin archive.
pub trait MarkerProbe {
    /// Version string of the bundled marker class, or `None` when it cannot be read.
    fn probe(&self, archive: &mut dyn PluginArchive) -> Option<String>;
}

/// Default probe evaluating the class file bytes in isolation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassFileProbe;

impl MarkerProbe for ClassFileProbe {
    fn probe(&self, archive: &mut dyn PluginArchive) -> Option<String> {
        let bytes = match archive.read_entry(VERSION_MARKER_CLASS) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(archive = %archive.path().display(), error = %err, "marker class unreadable");
                return None;
            }
        };
        let mut load_class = |entry: &str| archive.read_entry(entry).ok();
        let result = read_current_version(&bytes, VERSION_MARKER_FIELD, &mut load_class);
        match result {
            Ok(version) => Some(version.to_string()),
            Err(err) => {
                tracing::debug!(archive = %archive.path().display(), error = %err, "marker class not evaluable");
                None
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("class file truncated at offset {0}")]
    Truncated(usize),
    #[error("not a class file")]
    BadMagic,
    #[error("constant pool entry {0} is invalid")]
    BadConstant(u16),
    #[error("unknown constant pool tag {0}")]
    UnknownTag(u8),
    #[error("static field `{0}` not declared")]
    MissingField(String),
    #[error("class has no static initializer")]
    NoInitializer,
    #[error("class `{0}` is not present in the archive")]
    MissingClass(String),
    #[error("static method `{0}` not declared")]
    MissingMethod(String),
    #[error("unsupported opcode 0x{0:02x}")]
    UnsupportedOpcode(u8),
    #[error("static initializer never assigns `{0}` from a constructor call")]
    NotAssigned(String),
    #[error("factory method does not return a constructed version")]
    NotReturned,
}

const ACC_STATIC: u16 = 0x0008;

/// Evaluate the integers handed to `new Self(major, minor[, patch])` right before
/// `putstatic <field>`. When the stored value comes from a no-argument static
/// factory returning the class itself, the factory's owner is fetched through
/// `load_class` (keyed by `<internal/name>.class`) and its body is evaluated instead.
pub fn read_current_version(
    bytes: &[u8],
    field: &str,
    load_class: &mut dyn FnMut(&str) -> Option<Vec<u8>>,
) -> Result<Version, ProbeError> {
    let class = ClassFile::parse(bytes)?;
    if !class
        .fields
        .iter()
        .any(|member| member.access & ACC_STATIC != 0 && class.utf8(member.name) == Some(field))
    {
        return Err(ProbeError::MissingField(field.to_string()));
    }
    let code = class
        .methods
        .iter()
        .find(|member| class.utf8(member.name) == Some("<clinit>"))
        .and_then(|member| member.code.as_deref())
        .ok_or(ProbeError::NoInitializer)?;
    let target = class
        .class_name(class.this_class)
        .ok_or(ProbeError::BadConstant(class.this_class))?;

    match Interpreter::new(&class, target, Goal::StoreField(field)).run(code)? {
        Evaluated::Version(version) => Ok(version),
        Evaluated::Call(index) => read_factory(&class, index, target, load_class),
    }
}

fn read_factory(
    class: &ClassFile,
    index: u16,
    target: &str,
    load_class: &mut dyn FnMut(&str) -> Option<Vec<u8>>,
) -> Result<Version, ProbeError> {
    let (owner, name, descriptor) = class.member_ref(index)?;
    let owner = class.class_name(owner).ok_or(ProbeError::BadConstant(owner))?;
    let bytes = load_class(&format!("{owner}.class"))
        .ok_or_else(|| ProbeError::MissingClass(owner.to_string()))?;
    let factory = ClassFile::parse(&bytes)?;
    let code = factory
        .methods
        .iter()
        .find(|member| {
            member.access & ACC_STATIC != 0
                && factory.utf8(member.name) == Some(name)
                && factory.utf8(member.descriptor) == Some(descriptor)
        })
        .and_then(|member| member.code.as_deref())
        .ok_or_else(|| ProbeError::MissingMethod(format!("{owner}.{name}{descriptor}")))?;

    match Interpreter::new(&factory, target, Goal::Return).run(code)? {
        Evaluated::Version(version) => Ok(version),
        Evaluated::Call(_) => Err(ProbeError::NotReturned),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProbeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ProbeError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, ProbeError> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, ProbeError> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn u4(&mut self) -> Result<u32, ProbeError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}

#[derive(Debug, Clone)]
enum Constant {
    Empty,
    Utf8(String),
    Integer(i32),
    Class(u16),
    MemberRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    Other,
}

struct Member {
    access: u16,
    name: u16,
    descriptor: u16,
    code: Option<Vec<u8>>,
}

struct ClassFile {
    constants: Vec<Constant>,
    this_class: u16,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

impl ClassFile {
    fn parse(bytes: &[u8]) -> Result<Self, ProbeError> {
        let mut reader = Reader::new(bytes);
        if reader.u4()? != 0xCAFE_BABE {
            return Err(ProbeError::BadMagic);
        }
        reader.take(4)?;
        let count = reader.u2()?;
        let mut constants = vec![Constant::Empty];
        while constants.len() < count as usize {
            let tag = reader.u1()?;
            let constant = match tag {
                1 => {
                    let len = reader.u2()? as usize;
                    // Modified UTF-8 only differs from UTF-8 for NUL and supplementary
                    // characters, neither of which appear in the names we compare.
                    Constant::Utf8(String::from_utf8_lossy(reader.take(len)?).into_owned())
                }
                3 => Constant::Integer(reader.u4()? as i32),
                4 => {
                    reader.u4()?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.take(8)?;
                    constants.push(Constant::Other);
                    Constant::Empty
                }
                7 => Constant::Class(reader.u2()?),
                8 | 16 | 19 | 20 => {
                    reader.u2()?;
                    Constant::Other
                }
                9..=11 => Constant::MemberRef {
                    class: reader.u2()?,
                    name_and_type: reader.u2()?,
                },
                12 => Constant::NameAndType {
                    name: reader.u2()?,
                    descriptor: reader.u2()?,
                },
                15 => {
                    reader.take(3)?;
                    Constant::Other
                }
                17 | 18 => {
                    reader.take(4)?;
                    Constant::Other
                }
                other => return Err(ProbeError::UnknownTag(other)),
            };
            constants.push(constant);
        }

        let mut class = Self {
            constants,
            this_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        reader.u2()?;
        class.this_class = reader.u2()?;
        reader.u2()?;
        let interfaces = reader.u2()? as usize;
        reader.take(interfaces * 2)?;
        class.fields = class.members(&mut reader)?;
        class.methods = class.members(&mut reader)?;
        Ok(class)
    }

    fn members(&self, reader: &mut Reader<'_>) -> Result<Vec<Member>, ProbeError> {
        let count = reader.u2()?;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access = reader.u2()?;
            let name = reader.u2()?;
            let descriptor = reader.u2()?;
            let mut code = None;
            for _ in 0..reader.u2()? {
                let attr_name = reader.u2()?;
                let len = reader.u4()? as usize;
                let body = reader.take(len)?;
                if self.utf8(attr_name) == Some("Code") {
                    let mut attr = Reader::new(body);
                    attr.take(4)?;
                    let code_len = attr.u4()? as usize;
                    code = Some(attr.take(code_len)?.to_vec());
                }
            }
            members.push(Member {
                access,
                name,
                descriptor,
                code,
            });
        }
        Ok(members)
    }

    fn constant(&self, index: u16) -> Result<&Constant, ProbeError> {
        self.constants
            .get(index as usize)
            .ok_or(ProbeError::BadConstant(index))
    }

    fn utf8(&self, index: u16) -> Option<&str> {
        match self.constants.get(index as usize)? {
            Constant::Utf8(value) => Some(value),
            _ => None,
        }
    }

    /// Resolve a field/method reference into (owner class index, name, descriptor).
    fn member_ref(&self, index: u16) -> Result<(u16, &str, &str), ProbeError> {
        let Constant::MemberRef {
            class,
            name_and_type,
        } = self.constant(index)?
        else {
            return Err(ProbeError::BadConstant(index));
        };
        let Constant::NameAndType { name, descriptor } = self.constant(*name_and_type)? else {
            return Err(ProbeError::BadConstant(*name_and_type));
        };
        let name = self.utf8(*name).ok_or(ProbeError::BadConstant(*name))?;
        let descriptor = self
            .utf8(*descriptor)
            .ok_or(ProbeError::BadConstant(*descriptor))?;
        Ok((*class, name, descriptor))
    }

    fn class_name(&self, class_index: u16) -> Option<&str> {
        match self.constants.get(class_index as usize)? {
            Constant::Class(name) => self.utf8(*name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Int(i32),
    NewTarget,
    Constructed(Version),
    /// Result of a no-argument static call returning the target class; the
    /// operand is the method reference in the current pool.
    Call(u16),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal<'g> {
    StoreField(&'g str),
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evaluated {
    Version(Version),
    Call(u16),
}

struct Interpreter<'c> {
    class: &'c ClassFile,
    target: &'c str,
    goal: Goal<'c>,
    stack: Vec<Slot>,
}

impl<'c> Interpreter<'c> {
    fn new(class: &'c ClassFile, target: &'c str, goal: Goal<'c>) -> Self {
        Self {
            class,
            target,
            goal,
            stack: Vec::new(),
        }
    }

    fn pop(&mut self) -> Slot {
        self.stack.pop().unwrap_or(Slot::Other)
    }

    fn is_target(&self, class_index: u16) -> bool {
        self.class.class_name(class_index) == Some(self.target)
    }

    fn unresolved(&self) -> ProbeError {
        match self.goal {
            Goal::StoreField(field) => ProbeError::NotAssigned(field.to_string()),
            Goal::Return => ProbeError::NotReturned,
        }
    }

    fn settle(&self, value: Slot) -> Result<Evaluated, ProbeError> {
        match (value, self.goal) {
            (Slot::Constructed(version), _) => Ok(Evaluated::Version(version)),
            (Slot::Call(index), Goal::StoreField(_)) => Ok(Evaluated::Call(index)),
            _ => Err(self.unresolved()),
        }
    }

    fn run(mut self, code: &[u8]) -> Result<Evaluated, ProbeError> {
        let class = self.class;
        let mut reader = Reader::new(code);
        while reader.pos < code.len() {
            let opcode = reader.u1()?;
            match opcode {
                0x00 => {}
                0x01 => self.stack.push(Slot::Other),
                0x02..=0x08 => self.stack.push(Slot::Int(opcode as i32 - 0x03)),
                0x09..=0x0f => self.stack.push(Slot::Other),
                0x10 => {
                    let value = reader.u1()? as i8;
                    self.stack.push(Slot::Int(value as i32));
                }
                0x11 => {
                    let value = reader.u2()? as i16;
                    self.stack.push(Slot::Int(value as i32));
                }
                0x12 => {
                    let index = reader.u1()? as u16;
                    self.push_constant(index)?;
                }
                0x13 => {
                    let index = reader.u2()?;
                    self.push_constant(index)?;
                }
                0x57 => {
                    self.pop();
                }
                0x59 => {
                    let top = self.stack.last().copied().unwrap_or(Slot::Other);
                    self.stack.push(top);
                }
                0xb0 if self.goal == Goal::Return => {
                    let value = self.pop();
                    return self.settle(value);
                }
                0xb1 => break,
                0xb2 => {
                    reader.u2()?;
                    self.stack.push(Slot::Other);
                }
                0xb3 => {
                    let index = reader.u2()?;
                    let (owner, name, _) = class.member_ref(index)?;
                    let value = self.pop();
                    if let Goal::StoreField(field) = self.goal
                        && name == field
                        && self.is_target(owner)
                    {
                        return self.settle(value);
                    }
                }
                0xb7 => {
                    let index = reader.u2()?;
                    self.invoke_special(index)?;
                }
                0xb8 => {
                    let index = reader.u2()?;
                    let (_, _, descriptor) = class.member_ref(index)?;
                    let (params, returns) = descriptor_shape(descriptor);
                    for _ in 0..params.len() {
                        self.pop();
                    }
                    if returns {
                        let slot = if returns_class(descriptor, self.target) {
                            Slot::Call(index)
                        } else {
                            Slot::Other
                        };
                        self.stack.push(slot);
                    }
                }
                0xbb => {
                    let index = reader.u2()?;
                    let slot = if self.is_target(index) {
                        Slot::NewTarget
                    } else {
                        Slot::Other
                    };
                    self.stack.push(slot);
                }
                other => return Err(ProbeError::UnsupportedOpcode(other)),
            }
        }
        Err(self.unresolved())
    }

    fn push_constant(&mut self, index: u16) -> Result<(), ProbeError> {
        let slot = match self.class.constant(index)? {
            Constant::Integer(value) => Slot::Int(*value),
            _ => Slot::Other,
        };
        self.stack.push(slot);
        Ok(())
    }

    fn invoke_special(&mut self, index: u16) -> Result<(), ProbeError> {
        let class = self.class;
        let (owner, name, descriptor) = class.member_ref(index)?;
        let (params, _) = descriptor_shape(descriptor);
        let mut args = Vec::with_capacity(params.len());
        for _ in 0..params.len() {
            args.push(self.pop());
        }
        args.reverse();
        let receiver = self.pop();
        if name != "<init>" || !self.is_target(owner) || receiver != Slot::NewTarget {
            return Ok(());
        }
        let ints: Option<Vec<u32>> = params
            .iter()
            .zip(&args)
            .map(|(param, arg)| match (param, arg) {
                ('I', Slot::Int(value)) => u32::try_from(*value).ok(),
                _ => None,
            })
            .collect();
        let version = match ints.as_deref() {
            Some([major, minor, patch]) => Some(Version::new(*major, *minor, *patch)),
            Some([major, minor]) => Some(Version::new(*major, *minor, 0)),
            _ => None,
        };
        if let (Some(version), Some(top)) = (version, self.stack.last_mut())
            && *top == Slot::NewTarget
        {
            *top = Slot::Constructed(version);
        }
        Ok(())
    }
}

/// `()L<class>;`: a no-argument method returning `class`.
fn returns_class(descriptor: &str, class: &str) -> bool {
    descriptor
        .strip_prefix("()L")
        .and_then(|rest| rest.strip_suffix(';'))
        == Some(class)
}

/// Parameter type tags (first char of each parameter) and whether the method returns a value.
fn descriptor_shape(descriptor: &str) -> (Vec<char>, bool) {
    let mut params = Vec::new();
    let mut chars = descriptor.chars().skip_while(|c| *c == '(');
    let mut returns = false;
    while let Some(c) = chars.next() {
        match c {
            ')' => {
                returns = chars.next().is_some_and(|r| r != 'V');
                break;
            }
            '[' => {
                while let Some(next) = chars.next() {
                    if next == 'L' {
                        for inner in chars.by_ref() {
                            if inner == ';' {
                                break;
                            }
                        }
                        break;
                    }
                    if next != '[' {
                        break;
                    }
                }
                params.push('[');
            }
            'L' => {
                for inner in chars.by_ref() {
                    if inner == ';' {
                        break;
                    }
                }
                params.push('L');
            }
            other => params.push(other),
        }
    }
    (params, returns)
}
