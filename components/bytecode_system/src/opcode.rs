//! Bytecode opcodes
//!
//! One byte per opcode followed by zero or more inline operands. Numbering
//! follows the JVM where an equivalent instruction exists; the Kira-specific
//! tuple, generic and trait instructions live in the `0xd0` block.

/// Shape of the inline operands that follow an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operands
    None,
    /// One unsigned byte (local slot, constant index, arity)
    U8,
    /// One signed byte immediate
    I8,
    /// One unsigned 16-bit index
    U16,
    /// One signed 16-bit immediate or branch offset
    I16,
    /// 16-bit index followed by an unsigned byte (`invokevirtual`)
    U16U8,
    /// Unsigned byte followed by a signed byte (`iinc`)
    U8I8,
}

impl OperandLayout {
    /// Number of operand bytes following the opcode.
    pub const fn width(self) -> usize {
        match self {
            OperandLayout::None => 0,
            OperandLayout::U8 | OperandLayout::I8 => 1,
            OperandLayout::U16 | OperandLayout::I16 | OperandLayout::U8I8 => 2,
            OperandLayout::U16U8 => 3,
        }
    }
}

macro_rules! opcodes {
    ($( $(#[$doc:meta])* $name:ident = $byte:literal, $mnemonic:literal, $layout:ident; )*) => {
        /// Bytecode opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$doc])* $name = $byte, )*
        }

        impl Opcode {
            /// Every opcode, in numbering order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Decode an opcode byte.
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $byte => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            /// Assembly mnemonic, as printed by the disassembler.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Inline operand layout.
            pub fn layout(self) -> OperandLayout {
                match self {
                    $( Opcode::$name => OperandLayout::$layout, )*
                }
            }
        }
    };
}

opcodes! {
    /// Do nothing
    Nop = 0x00, "nop", None;
    /// Push null
    AconstNull = 0x01, "aconst_null", None;
    /// Push integer -1
    IconstM1 = 0x02, "iconst_m1", None;
    /// Push integer 0
    Iconst0 = 0x03, "iconst_0", None;
    /// Push integer 1
    Iconst1 = 0x04, "iconst_1", None;
    /// Push integer 2
    Iconst2 = 0x05, "iconst_2", None;
    /// Push integer 3
    Iconst3 = 0x06, "iconst_3", None;
    /// Push integer 4
    Iconst4 = 0x07, "iconst_4", None;
    /// Push integer 5
    Iconst5 = 0x08, "iconst_5", None;
    /// Push float 0.0
    Fconst0 = 0x0b, "fconst_0", None;
    /// Push float 1.0
    Fconst1 = 0x0c, "fconst_1", None;
    /// Push float 2.0
    Fconst2 = 0x0d, "fconst_2", None;
    /// Push a sign-extended byte
    Bipush = 0x10, "bipush", I8;
    /// Push a sign-extended short
    Sipush = 0x11, "sipush", I16;
    /// Push a constant (8-bit pool index)
    Ldc = 0x12, "ldc", U8;
    /// Push a constant (16-bit pool index)
    LdcW = 0x13, "ldc_w", U16;
    /// Push a local
    Load = 0x15, "load", U8;
    /// Push local 0
    Load0 = 0x1a, "load_0", None;
    /// Push local 1
    Load1 = 0x1b, "load_1", None;
    /// Push local 2
    Load2 = 0x1c, "load_2", None;
    /// Push local 3
    Load3 = 0x1d, "load_3", None;
    /// `array, index -> element`
    ArrayLoad = 0x32, "array_load", None;
    /// Pop into a local
    Store = 0x36, "store", U8;
    /// Pop into local 0
    Store0 = 0x3b, "store_0", None;
    /// Pop into local 1
    Store1 = 0x3c, "store_1", None;
    /// Pop into local 2
    Store2 = 0x3d, "store_2", None;
    /// Pop into local 3
    Store3 = 0x3e, "store_3", None;
    /// `array, index, value ->`
    ArrayStore = 0x53, "array_store", None;
    /// Discard the top value
    Pop = 0x57, "pop", None;
    /// Discard the top two values
    Pop2 = 0x58, "pop2", None;
    /// Duplicate the top value
    Dup = 0x59, "dup", None;
    /// Swap the top two values
    Swap = 0x5f, "swap", None;
    /// Integer add
    Iadd = 0x60, "iadd", None;
    /// Float add
    Fadd = 0x62, "fadd", None;
    /// Integer subtract
    Isub = 0x64, "isub", None;
    /// Float subtract
    Fsub = 0x66, "fsub", None;
    /// Integer multiply
    Imul = 0x68, "imul", None;
    /// Float multiply
    Fmul = 0x6a, "fmul", None;
    /// Integer divide
    Idiv = 0x6c, "idiv", None;
    /// Float divide
    Fdiv = 0x6e, "fdiv", None;
    /// Integer remainder
    Irem = 0x70, "irem", None;
    /// Float remainder
    Frem = 0x72, "frem", None;
    /// Integer negate
    Ineg = 0x74, "ineg", None;
    /// Float negate
    Fneg = 0x76, "fneg", None;
    /// Shift left
    Ishl = 0x78, "ishl", None;
    /// Arithmetic shift right
    Ishr = 0x7a, "ishr", None;
    /// Logical shift right
    Iushr = 0x7c, "iushr", None;
    /// Bitwise and
    Iand = 0x7e, "iand", None;
    /// Bitwise or
    Ior = 0x80, "ior", None;
    /// Bitwise xor
    Ixor = 0x82, "ixor", None;
    /// Add a signed byte to an integer local
    Iinc = 0x84, "iinc", U8I8;
    /// Integer to float
    I2f = 0x86, "i2f", None;
    /// Float to integer
    F2i = 0x8b, "f2i", None;
    /// Three-way integer compare
    Icmp = 0x94, "icmp", None;
    /// Three-way float compare
    Fcmp = 0x95, "fcmp", None;
    /// Branch if zero
    Ifeq = 0x99, "ifeq", I16;
    /// Branch if non-zero
    Ifne = 0x9a, "ifne", I16;
    /// Branch if negative
    Iflt = 0x9b, "iflt", I16;
    /// Branch if non-negative
    Ifge = 0x9c, "ifge", I16;
    /// Branch if positive
    Ifgt = 0x9d, "ifgt", I16;
    /// Branch if non-positive
    Ifle = 0x9e, "ifle", I16;
    /// Branch if integers are equal
    IfIcmpeq = 0x9f, "if_icmpeq", I16;
    /// Branch if integers differ
    IfIcmpne = 0xa0, "if_icmpne", I16;
    /// Branch if less than
    IfIcmplt = 0xa1, "if_icmplt", I16;
    /// Branch if greater or equal
    IfIcmpge = 0xa2, "if_icmpge", I16;
    /// Branch if greater than
    IfIcmpgt = 0xa3, "if_icmpgt", I16;
    /// Branch if less or equal
    IfIcmple = 0xa4, "if_icmple", I16;
    /// Branch if both references name the same object
    IfAcmpeq = 0xa5, "if_acmpeq", I16;
    /// Branch if the references differ
    IfAcmpne = 0xa6, "if_acmpne", I16;
    /// Unconditional branch
    Goto = 0xa7, "goto", I16;
    /// Push the return address and branch
    Jsr = 0xa8, "jsr", I16;
    /// Jump to the return address held in a local
    Ret = 0xa9, "ret", U8;
    /// Return an integer
    Ireturn = 0xac, "ireturn", None;
    /// Return a float
    Freturn = 0xae, "freturn", None;
    /// Return a reference
    Areturn = 0xb0, "areturn", None;
    /// Return nothing
    Return = 0xb1, "return", None;
    /// Read an instance field (field-ref index)
    Getfield = 0xb4, "getfield", U16;
    /// Write an instance field (field-ref index)
    Putfield = 0xb5, "putfield", U16;
    /// Dispatch on the receiver's type (method-ref index, argument count)
    InvokeVirtual = 0xb6, "invokevirtual", U16U8;
    /// Call a method by table index
    InvokeStatic = 0xb8, "invokestatic", U16;
    /// Instantiate a class (class-ref index)
    New = 0xbb, "new", U16;
    /// `length -> array`
    NewArray = 0xbc, "newarray", None;
    /// `array -> length`
    ArrayLength = 0xbe, "arraylength", None;
    /// Subtype test (class-ref index)
    Instanceof = 0xc1, "instanceof", U16;
    /// Branch if null
    Ifnull = 0xc6, "ifnull", I16;
    /// Branch if not null
    Ifnonnull = 0xc7, "ifnonnull", I16;
    /// Pack the top N values into a tuple
    NewTuple = 0xd0, "new_tuple", U8;
    /// Build a generic instance from a base type and N parameter types
    NewGeneric = 0xd1, "new_generic", U8;
    /// Trait test (class-ref index of the trait)
    Implements = 0xd2, "implements", U16;
    /// Push boolean true
    BconstTrue = 0xd3, "bconst_true", None;
    /// Push boolean false
    BconstFalse = 0xd4, "bconst_false", None;
    /// Pop and print a line
    Print = 0xfe, "print", None;
    /// Stop the machine
    Halt = 0xff, "halt", None;
}

impl Opcode {
    /// Opcode byte.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Total encoded length: opcode byte plus operands.
    pub fn encoded_len(self) -> usize {
        1 + self.layout().width()
    }

    /// Whether the single `I16` operand is a relative branch offset.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Ifeq
                | Opcode::Ifne
                | Opcode::Iflt
                | Opcode::Ifge
                | Opcode::Ifgt
                | Opcode::Ifle
                | Opcode::IfIcmpeq
                | Opcode::IfIcmpne
                | Opcode::IfIcmplt
                | Opcode::IfIcmpge
                | Opcode::IfIcmpgt
                | Opcode::IfIcmple
                | Opcode::IfAcmpeq
                | Opcode::IfAcmpne
                | Opcode::Ifnull
                | Opcode::Ifnonnull
                | Opcode::Goto
                | Opcode::Jsr
        )
    }

    /// Whether control never falls through to the next instruction.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Goto
                | Opcode::Ret
                | Opcode::Ireturn
                | Opcode::Freturn
                | Opcode::Areturn
                | Opcode::Return
                | Opcode::Halt
        )
    }
}
