use crate::vm::{make, read_operands, Instructions, Opcode};

#[test]
fn test_make() {
    let cases: Vec<(Opcode, Vec<usize>, Vec<u8>)> = vec![
        (
            Opcode::Constant,
            vec![65534],
            vec![Opcode::Constant as u8, 255, 254],
        ),
        (Opcode::Add, vec![], vec![Opcode::Add as u8]),
        (
            Opcode::GetLocal,
            vec![255],
            vec![Opcode::GetLocal as u8, 255],
        ),
        (
            Opcode::Closure,
            vec![65534, 255],
            vec![Opcode::Closure as u8, 255, 254, 255],
        ),
    ];
    for (op, operands, expected) in cases {
        assert_eq!(make(op, &operands), expected, "make {op:?}");
    }
}

#[test]
fn test_read_operands() {
    let cases: Vec<(Opcode, Vec<usize>, usize)> = vec![
        (Opcode::Constant, vec![65535], 2),
        (Opcode::GetLocal, vec![255], 1),
        (Opcode::Closure, vec![65535, 255], 3),
    ];
    for (op, operands, bytes_read) in cases {
        let instruction = make(op, &operands);
        let def = op.def();
        let (read, offset) = read_operands(&def, &instruction[1..]);
        assert_eq!(offset, bytes_read, "offset for {op:?}");
        assert_eq!(read, operands, "operands for {op:?}");
    }
}

#[test]
fn test_opcode_bytes_round_trip() {
    let all = [
        Opcode::Constant,
        Opcode::Pop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::True,
        Opcode::False,
        Opcode::Null,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::GreaterThan,
        Opcode::Minus,
        Opcode::Bang,
        Opcode::JumpNotTruthy,
        Opcode::Jump,
        Opcode::GetGlobal,
        Opcode::SetGlobal,
        Opcode::GetLocal,
        Opcode::SetLocal,
        Opcode::GetBuiltin,
        Opcode::GetFree,
        Opcode::CurrentClosure,
        Opcode::Array,
        Opcode::Hash,
        Opcode::Index,
        Opcode::Call,
        Opcode::ReturnValue,
        Opcode::Return,
        Opcode::Closure,
    ];
    for op in all {
        assert_eq!(Opcode::from_byte(op as u8), Some(op));
    }
    assert_eq!(Opcode::from_byte(all.len() as u8), None);
    assert_eq!(Opcode::from_byte(255), None);
}

#[test]
fn test_disassembly_format() {
    let instructions = Instructions(
        [
            make(Opcode::Add, &[]),
            make(Opcode::GetLocal, &[1]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Constant, &[65535]),
            make(Opcode::Closure, &[65535, 255]),
        ]
        .concat(),
    );
    let expected = "\
0000 OpAdd
0001 OpGetLocal 1
0003 OpConstant 2
0006 OpConstant 65535
0009 OpClosure 65535 255
";
    assert_eq!(instructions.to_string(), expected);
}

#[test]
fn test_jump_operands_stay_in_bounds() {
    // Backpatched jumps always land inside (or at the end of) the
    // instruction stream.
    let bytecode =
        super::compile_source("if (1 < 2) { 10 } else { 20 }; if (false) { 1 };").unwrap();
    let bytes = &bytecode.instructions;
    let mut offset = 0;
    while offset < bytes.len() {
        let op = Opcode::from_byte(bytes[offset]).expect("valid opcode");
        let def = op.def();
        let (operands, read) = read_operands(&def, &bytes[offset + 1..]);
        if matches!(op, Opcode::Jump | Opcode::JumpNotTruthy) {
            assert!(operands[0] <= bytes.len(), "jump target out of bounds");
        }
        offset += 1 + read;
    }
}
