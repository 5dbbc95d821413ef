//! Binary `KIRA` format
//!
//! Little-endian throughout. Sections are read in declared order with no
//! cross-validation between them; the interpreter bounds-checks indices when
//! it uses them.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::constant::{tag, Constant, ConstantPool};
use crate::program::{ClassDescriptor, Header, MethodDescriptor, ProgramImage, MAGIC};

/// Reasons a byte stream is not a loadable program.
#[derive(Debug, Error)]
pub enum LoadError {
    /// First four bytes are not `KIRA`
    #[error("bad magic {found:02x?}, expected \"KIRA\"")]
    BadMagic {
        /// Bytes actually found
        found: [u8; 4],
    },

    /// Input ended inside a section
    #[error("truncated {section} at byte offset {offset}")]
    Truncated {
        /// Section being read
        section: &'static str,
        /// Offset where more bytes were needed
        offset: usize,
    },

    /// Constant tag outside the known set
    #[error("unknown constant tag {tag} at pool index {index}")]
    UnknownConstantTag {
        /// Tag value read
        tag: u32,
        /// Pool index of the entry
        index: usize,
    },

    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    section: &'static str,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            section: "header",
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(LoadError::Truncated {
                section: self.section,
                offset: self.offset,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, LoadError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, LoadError> {
        self.array().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, LoadError> {
        self.array().map(f32::from_le_bytes)
    }

    fn len(&mut self) -> Result<usize, LoadError> {
        // u32 always fits in usize on supported targets
        Ok(self.u32()? as usize)
    }
}

impl ProgramImage {
    /// Decode a program from its binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut reader = Reader::new(bytes);

        let magic: [u8; 4] = reader.array()?;
        if magic != MAGIC {
            return Err(LoadError::BadMagic { found: magic });
        }
        let major = reader.u16()?;
        let minor = reader.u16()?;
        let declared_constants = reader.u32()?;
        let declared_methods = reader.u32()?;
        let declared_classes = reader.u32()?;
        let declared_code = reader.u32()?;
        let entry_point = reader.u32()?;
        let flags = reader.u32()?;
        let header = Header {
            major,
            minor,
            entry_point,
            flags,
        };

        reader.section = "constant pool";
        let count = reader.len()?;
        let mut constants = ConstantPool::new();
        for index in 0..count {
            constants.add(read_constant(&mut reader, index)?);
        }

        reader.section = "method table";
        let count = reader.len()?;
        let mut methods = Vec::new();
        for _ in 0..count {
            methods.push(MethodDescriptor {
                name_index: reader.u16()?,
                descriptor_index: reader.u16()?,
                code_offset: reader.u16()?,
                code_length: reader.u16()?,
                max_stack: reader.u8()?,
                max_locals: reader.u8()?,
                param_count: reader.u8()?,
                flags: reader.u8()?,
            });
        }

        reader.section = "class table";
        let count = reader.len()?;
        let mut classes = Vec::new();
        for _ in 0..count {
            classes.push(ClassDescriptor {
                name_index: reader.u16()?,
                super_class_index: reader.u16()?,
                field_count: reader.u16()?,
                method_count: reader.u16()?,
                flags: reader.u16()?,
            });
        }

        reader.section = "bytecode";
        let length = reader.len()?;
        let code = reader.take(length)?.to_vec();

        let declared = [declared_constants, declared_methods, declared_classes, declared_code];
        let actual = [constants.len(), methods.len(), classes.len(), code.len()];
        if declared.iter().zip(actual).any(|(&d, a)| d as usize != a) {
            log::debug!(
                "header sizes {:?} disagree with section counts {:?}",
                declared,
                actual
            );
        }

        log::debug!(
            "loaded KIRA {}.{}: {} constants, {} methods, {} classes, {} code bytes",
            major,
            minor,
            constants.len(),
            methods.len(),
            classes.len(),
            code.len()
        );

        Ok(Self {
            header,
            constants,
            methods,
            classes,
            code,
        })
    }

    /// Encode the program. Header sizes are recomputed from the tables.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&self.header.major.to_le_bytes());
        bytes.extend_from_slice(&self.header.minor.to_le_bytes());
        put_len(&mut bytes, self.constants.len());
        put_len(&mut bytes, self.methods.len());
        put_len(&mut bytes, self.classes.len());
        put_len(&mut bytes, self.code.len());
        bytes.extend_from_slice(&self.header.entry_point.to_le_bytes());
        bytes.extend_from_slice(&self.header.flags.to_le_bytes());

        put_len(&mut bytes, self.constants.len());
        for constant in self.constants.iter() {
            write_constant(&mut bytes, constant);
        }

        put_len(&mut bytes, self.methods.len());
        for method in &self.methods {
            bytes.extend_from_slice(&method.name_index.to_le_bytes());
            bytes.extend_from_slice(&method.descriptor_index.to_le_bytes());
            bytes.extend_from_slice(&method.code_offset.to_le_bytes());
            bytes.extend_from_slice(&method.code_length.to_le_bytes());
            bytes.push(method.max_stack);
            bytes.push(method.max_locals);
            bytes.push(method.param_count);
            bytes.push(method.flags);
        }

        put_len(&mut bytes, self.classes.len());
        for class in &self.classes {
            bytes.extend_from_slice(&class.name_index.to_le_bytes());
            bytes.extend_from_slice(&class.super_class_index.to_le_bytes());
            bytes.extend_from_slice(&class.field_count.to_le_bytes());
            bytes.extend_from_slice(&class.method_count.to_le_bytes());
            bytes.extend_from_slice(&class.flags.to_le_bytes());
        }

        put_len(&mut bytes, self.code.len());
        bytes.extend_from_slice(&self.code);

        bytes
    }

    /// Read and decode a program file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Encode and write a program file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        fs::write(path.as_ref(), self.to_bytes())?;
        Ok(())
    }
}

fn read_constant(reader: &mut Reader<'_>, index: usize) -> Result<Constant, LoadError> {
    let constant = match reader.u32()? {
        tag::UTF8 => {
            let length = reader.len()?;
            Constant::Utf8(reader.take(length)?.to_vec())
        }
        tag::INTEGER => Constant::Integer(reader.i32()?),
        tag::FLOAT => Constant::Float(reader.f32()?),
        tag::STRING => Constant::String {
            utf8_index: reader.u16()?,
        },
        tag::CLASS => Constant::ClassRef {
            class_index: reader.u16()?,
        },
        tag::FIELDREF => Constant::FieldRef {
            class_index: reader.u16()?,
            name_index: reader.u16()?,
        },
        tag::METHODREF => Constant::MethodRef {
            class_index: reader.u16()?,
            name_index: reader.u16()?,
        },
        other => return Err(LoadError::UnknownConstantTag { tag: other, index }),
    };
    Ok(constant)
}

fn write_constant(bytes: &mut Vec<u8>, constant: &Constant) {
    bytes.extend_from_slice(&constant.tag().to_le_bytes());
    match constant {
        Constant::Utf8(raw) => {
            put_len(bytes, raw.len());
            bytes.extend_from_slice(raw);
        }
        Constant::Integer(value) => bytes.extend_from_slice(&value.to_le_bytes()),
        Constant::Float(value) => bytes.extend_from_slice(&value.to_le_bytes()),
        Constant::String { utf8_index } => bytes.extend_from_slice(&utf8_index.to_le_bytes()),
        Constant::ClassRef { class_index } => bytes.extend_from_slice(&class_index.to_le_bytes()),
        Constant::FieldRef {
            class_index,
            name_index,
        }
        | Constant::MethodRef {
            class_index,
            name_index,
        } => {
            bytes.extend_from_slice(&class_index.to_le_bytes());
            bytes.extend_from_slice(&name_index.to_le_bytes());
        }
    }
}

fn put_len(bytes: &mut Vec<u8>, len: usize) {
    // Table sizes are bounded by the u16 indices that address them
    bytes.extend_from_slice(&(len as u32).to_le_bytes());
}
