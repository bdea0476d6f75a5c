mod bit_vec;
pub mod vm;

/// Load a compiled `progs.dat`, with the contents of its `.lno` file if there is one.
pub fn load(name: &str, data: &[u8], lines: Option<&[u8]>) -> Result<vm::Program, vm::LoadError> {
    let mut image = progs::Progs::default();
    progs::read_progs(data, &mut image)?;

    let lines = match lines {
        Some(data) => {
            let mut lines = progs::Lines::default();
            progs::read_lines(data, &image, &mut lines)?;
            Some(lines)
        }
        None => None,
    };

    vm::Program::from_progs(name, &image, lines.as_ref())
}
