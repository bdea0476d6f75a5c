use std::fmt;

/// A decoded statement.
///
/// Operands are global offsets except for branch targets, which the loader resolves from the
/// on-disk relative offsets to absolute statement indices. `op` stays raw so that an unknown
/// opcode is reported when it executes rather than when it loads.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct Statement {
    pub op: u16,
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl Statement {
    pub fn new(op: Op, a: i32, b: i32, c: i32) -> Statement {
        Statement { op: op as u16, a, b, c }
    }
}

/// How an opcode interprets one of its three operands.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    Unused,
    /// One global cell.
    Global,
    /// Three consecutive global cells.
    Vector,
    /// The base of a global array, whose highest valid index sits in the cell just before it.
    Array,
    /// An absolute statement index.
    Target,
}

macro_rules! ops {
    ($($op:ident = $code:literal $name:literal [$a:ident $b:ident $c:ident],)*) => {
        #[repr(u16)]
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        pub enum Op {
            $($op = $code,)*
        }

        impl Op {
            pub fn from_u16(code: u16) -> Option<Op> {
                match code {
                    $($code => Some(Op::$op),)*
                    _ => None,
                }
            }

            /// The mnemonic used by disassembly and the compiler's listings.
            pub fn name(self) -> &'static str {
                match self {
                    $(Op::$op => $name,)*
                }
            }

            pub fn operands(self) -> [Operand; 3] {
                match self {
                    $(Op::$op => [Operand::$a, Operand::$b, Operand::$c],)*
                }
            }
        }
    };
}

ops! {
    Done = 0 "DONE" [Vector Unused Unused],
    MulF = 1 "MUL_F" [Global Global Global],
    MulV = 2 "MUL_V" [Vector Vector Global],
    MulFV = 3 "MUL_FV" [Global Vector Vector],
    MulVF = 4 "MUL_VF" [Vector Global Vector],
    DivF = 5 "DIV_F" [Global Global Global],
    AddF = 6 "ADD_F" [Global Global Global],
    AddV = 7 "ADD_V" [Vector Vector Vector],
    SubF = 8 "SUB_F" [Global Global Global],
    SubV = 9 "SUB_V" [Vector Vector Vector],

    EqF = 10 "EQ_F" [Global Global Global],
    EqV = 11 "EQ_V" [Vector Vector Global],
    EqS = 12 "EQ_S" [Global Global Global],
    EqE = 13 "EQ_E" [Global Global Global],
    EqFnc = 14 "EQ_FNC" [Global Global Global],
    NeF = 15 "NE_F" [Global Global Global],
    NeV = 16 "NE_V" [Vector Vector Global],
    NeS = 17 "NE_S" [Global Global Global],
    NeE = 18 "NE_E" [Global Global Global],
    NeFnc = 19 "NE_FNC" [Global Global Global],

    Le = 20 "LE" [Global Global Global],
    Ge = 21 "GE" [Global Global Global],
    Lt = 22 "LT" [Global Global Global],
    Gt = 23 "GT" [Global Global Global],

    LoadF = 24 "LOAD_F" [Global Global Global],
    LoadV = 25 "LOAD_V" [Global Global Vector],
    LoadS = 26 "LOAD_S" [Global Global Global],
    LoadEnt = 27 "LOAD_ENT" [Global Global Global],
    LoadFld = 28 "LOAD_FLD" [Global Global Global],
    LoadFnc = 29 "LOAD_FNC" [Global Global Global],
    Address = 30 "ADDRESS" [Global Global Global],

    StoreF = 31 "STORE_F" [Global Global Unused],
    StoreV = 32 "STORE_V" [Vector Vector Unused],
    StoreS = 33 "STORE_S" [Global Global Unused],
    StoreEnt = 34 "STORE_ENT" [Global Global Unused],
    StoreFld = 35 "STORE_FLD" [Global Global Unused],
    StoreFnc = 36 "STORE_FNC" [Global Global Unused],

    StorePF = 37 "STOREP_F" [Global Global Unused],
    StorePV = 38 "STOREP_V" [Vector Global Unused],
    StorePS = 39 "STOREP_S" [Global Global Unused],
    StorePEnt = 40 "STOREP_ENT" [Global Global Unused],
    StorePFld = 41 "STOREP_FLD" [Global Global Unused],
    StorePFnc = 42 "STOREP_FNC" [Global Global Unused],

    Return = 43 "RETURN" [Vector Unused Unused],
    NotF = 44 "NOT_F" [Global Unused Global],
    NotV = 45 "NOT_V" [Vector Unused Global],
    NotS = 46 "NOT_S" [Global Unused Global],
    NotEnt = 47 "NOT_ENT" [Global Unused Global],
    NotFnc = 48 "NOT_FNC" [Global Unused Global],
    If = 49 "IF" [Global Target Unused],
    IfNot = 50 "IFNOT" [Global Target Unused],

    Call0 = 51 "CALL0" [Global Unused Unused],
    Call1 = 52 "CALL1" [Global Unused Unused],
    Call2 = 53 "CALL2" [Global Unused Unused],
    Call3 = 54 "CALL3" [Global Unused Unused],
    Call4 = 55 "CALL4" [Global Unused Unused],
    Call5 = 56 "CALL5" [Global Unused Unused],
    Call6 = 57 "CALL6" [Global Unused Unused],
    Call7 = 58 "CALL7" [Global Unused Unused],
    Call8 = 59 "CALL8" [Global Unused Unused],
    State = 60 "STATE" [Global Global Unused],
    Goto = 61 "GOTO" [Target Unused Unused],
    And = 62 "AND" [Global Global Global],
    Or = 63 "OR" [Global Global Global],
    BitAnd = 64 "BITAND" [Global Global Global],
    BitOr = 65 "BITOR" [Global Global Global],

    MulStoreF = 66 "MULSTORE_F" [Global Global Unused],
    MulStoreV = 67 "MULSTORE_V" [Global Vector Unused],
    MulStorePF = 68 "MULSTOREP_F" [Global Global Global],
    MulStorePV = 69 "MULSTOREP_V" [Global Global Vector],
    DivStoreF = 70 "DIVSTORE_F" [Global Global Unused],
    DivStorePF = 71 "DIVSTOREP_F" [Global Global Global],
    AddStoreF = 72 "ADDSTORE_F" [Global Global Unused],
    AddStoreV = 73 "ADDSTORE_V" [Vector Vector Unused],
    AddStorePF = 74 "ADDSTOREP_F" [Global Global Global],
    AddStorePV = 75 "ADDSTOREP_V" [Vector Global Vector],
    SubStoreF = 76 "SUBSTORE_F" [Global Global Unused],
    SubStoreV = 77 "SUBSTORE_V" [Vector Vector Unused],
    SubStorePF = 78 "SUBSTOREP_F" [Global Global Global],
    SubStorePV = 79 "SUBSTOREP_V" [Vector Global Vector],

    FetchGblF = 80 "FETCH_GBL_F" [Array Global Global],
    FetchGblV = 81 "FETCH_GBL_V" [Array Global Vector],
    FetchGblS = 82 "FETCH_GBL_S" [Array Global Global],
    FetchGblE = 83 "FETCH_GBL_E" [Array Global Global],
    FetchGblFnc = 84 "FETCH_GBL_FNC" [Array Global Global],

    BitSet = 88 "BITSET" [Global Global Unused],
    BitSetP = 89 "BITSETP" [Global Global Unused],
    BitClr = 90 "BITCLR" [Global Global Unused],
    BitClrP = 91 "BITCLRP" [Global Global Unused],

    ConvItoF = 122 "CONV_ITOF" [Global Unused Global],
    ConvFtoI = 123 "CONV_FTOI" [Global Unused Global],
}

impl Op {
    /// The number of arguments passed by a `CALLn` opcode.
    pub fn call_args(self) -> Option<usize> {
        match self {
            Op::Call0 | Op::Call1 | Op::Call2 | Op::Call3 | Op::Call4 |
            Op::Call5 | Op::Call6 | Op::Call7 | Op::Call8 =>
                Some((self as u16 - Op::Call0 as u16) as usize),
            _ => None,
        }
    }

    /// Whether execution never falls through to the next statement.
    pub fn is_terminator(self) -> bool {
        matches!(self, Op::Done | Op::Return | Op::Goto)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode() {
        assert_eq!(Op::from_u16(0), Some(Op::Done));
        assert_eq!(Op::from_u16(61), Some(Op::Goto));
        assert_eq!(Op::from_u16(65), Some(Op::BitOr));
        assert_eq!(Op::from_u16(80), Some(Op::FetchGblF));
        assert_eq!(Op::from_u16(123), Some(Op::ConvFtoI));

        assert_eq!(Op::from_u16(85), None);
        assert_eq!(Op::from_u16(124), None);
        assert_eq!(Op::from_u16(u16::MAX), None);
    }

    #[test]
    fn calls() {
        assert_eq!(Op::Call0.call_args(), Some(0));
        assert_eq!(Op::Call8.call_args(), Some(8));
        assert_eq!(Op::State.call_args(), None);
    }

    #[test]
    fn names() {
        assert_eq!(Op::StorePV.name(), "STOREP_V");
        assert_eq!(format!("{:<8}|", Op::If), "IF      |");
        assert_eq!(Op::If.operands(), [Operand::Global, Operand::Target, Operand::Unused]);
    }
}
