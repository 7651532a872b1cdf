//! Host implementations of the native registry's first 17 entries, the
//! ones that are not synthesized as bytecode by [`crate::bootstrap`].
//! Dispatched by `NativeProto::index`, which is that entry's position
//! in [`glint_core::natives::NATIVES`].

use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use glint_core::heap::ObjectKind;
use glint_core::Value;

use crate::error::RuntimeError;
use crate::print::type_name;
use crate::vm::Vm;

impl Vm {
    /// Invoke the host native at `index` with `args` in source
    /// parameter order (`args[0]` is the first declared parameter).
    pub(crate) fn call_native(&mut self, index: usize, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match index {
            0 => self.native_char_code(args),
            1 => self.native_code_char(args),
            2 => self.native_sub_str(args),
            3 => self.native_str_lower(args),
            4 => self.native_str_upper(args),
            5 => self.native_str_title(args),
            6 => self.native_cmp_str(args),
            7 => self.native_cmp_ic_str(args),
            8 => self.native_is_str_int(args),
            9 => self.native_ascii_to_int(args),
            10 => self.native_int_to_ascii(args),
            11 => self.native_time(args),
            12 => self.native_sleep(args),
            13 => self.native_read_ln(args),
            14 => self.native_read_file_bytes(args),
            15 => self.native_panic(args),
            16 => self.native_exit(args),
            other => Err(self.rt_err(format!("no host native registered at index {other}"))),
        }
    }

    fn arg_str(&self, args: &[Value], i: usize) -> Result<Rc<str>, RuntimeError> {
        match &args[i] {
            Value::Str(r) => match r.kind() {
                ObjectKind::Str { data, .. } => Ok(Rc::clone(data)),
                _ => unreachable!("Str value must reference a Str object"),
            },
            other => Err(self.rt_err(format!("expected str argument, found {}", type_name(other)))),
        }
    }

    fn arg_int(&self, args: &[Value], i: usize) -> Result<i64, RuntimeError> {
        match &args[i] {
            Value::Int(n) => Ok(*n),
            other => Err(self.rt_err(format!("expected int argument, found {}", type_name(other)))),
        }
    }

    fn alloc_str(&self, s: impl Into<Rc<str>>) -> Value {
        Value::Str(self.heap.alloc_str(s.into(), false))
    }

    fn native_char_code(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        let idx = self.arg_int(&args, 1)?;
        let bytes = s.as_bytes();
        if idx < 0 || idx as usize >= bytes.len() {
            return Err(self.rt_err(format!(
                "char_code: index {idx} out of range (len {})",
                bytes.len()
            )));
        }
        Ok(Value::Int(bytes[idx as usize] as i64))
    }

    fn native_code_char(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let code = self.arg_int(&args, 0)?;
        if !(0..=255).contains(&code) {
            return Err(self.rt_err(format!("code_char: {code} is not a byte value")));
        }
        Ok(self.alloc_str((code as u8 as char).to_string()))
    }

    fn native_sub_str(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        let start = self.arg_int(&args, 1)?;
        let len = self.arg_int(&args, 2)?;
        let bytes = s.as_bytes();
        let end = start
            .checked_add(len)
            .filter(|&e| start >= 0 && len >= 0 && e as usize <= bytes.len());
        let Some(end) = end else {
            return Err(self.rt_err(format!(
                "sub_str: range [{start}, {start}+{len}) out of bounds for string of length {}",
                bytes.len()
            )));
        };
        let slice = &bytes[start as usize..end as usize];
        let text = String::from_utf8_lossy(slice).into_owned();
        Ok(self.alloc_str(text))
    }

    fn native_str_lower(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        Ok(self.alloc_str(s.to_lowercase()))
    }

    fn native_str_upper(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        Ok(self.alloc_str(s.to_uppercase()))
    }

    fn native_str_title(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        let mut out = String::with_capacity(s.len());
        let mut capitalize_next = true;
        for ch in s.chars() {
            if ch.is_whitespace() {
                capitalize_next = true;
                out.push(ch);
            } else if capitalize_next {
                out.extend(ch.to_uppercase());
                capitalize_next = false;
            } else {
                out.extend(ch.to_lowercase());
            }
        }
        Ok(self.alloc_str(out))
    }

    fn native_cmp_str(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let a = self.arg_str(&args, 0)?;
        let b = self.arg_str(&args, 1)?;
        Ok(Value::Int(cmp_to_int(a.as_ref().cmp(b.as_ref()))))
    }

    fn native_cmp_ic_str(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let a = self.arg_str(&args, 0)?;
        let b = self.arg_str(&args, 1)?;
        Ok(Value::Int(cmp_to_int(
            a.to_lowercase().cmp(&b.to_lowercase()),
        )))
    }

    fn native_is_str_int(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        Ok(Value::Bool(s.parse::<i64>().is_ok()))
    }

    fn native_ascii_to_int(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let s = self.arg_str(&args, 0)?;
        let n = s
            .parse::<i64>()
            .map_err(|_| self.rt_err(format!("ascii_to_int: '{s}' is not an integer")))?;
        Ok(Value::Int(n))
    }

    fn native_int_to_ascii(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let n = self.arg_int(&args, 0)?;
        Ok(self.alloc_str(n.to_string()))
    }

    fn native_time(&mut self, _args: Vec<Value>) -> Result<Value, RuntimeError> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(Value::Int(secs))
    }

    fn native_sleep(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let millis = self.arg_int(&args, 0)?;
        if millis > 0 {
            std::thread::sleep(std::time::Duration::from_millis(millis as u64));
        }
        Ok(Value::Nil)
    }

    fn native_read_ln(&mut self, _args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => Ok(self.alloc_str("")),
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Ok(self.alloc_str(line))
            }
            Err(e) => Err(self.rt_err(format!("read_ln: {e}"))),
        }
    }

    /// `read_file_bytes(path, offset, length, buf, buf_offset)`: reads
    /// up to `length` bytes starting at `offset` in the file at `path`
    /// into `buf` starting at `buf_offset`, one array slot per byte
    /// (as an INT). Returns the number of bytes actually read, or `-1`
    /// if the file could not be opened or the offset is negative. The
    /// file handle is scoped to this call and closed on every exit path
    /// via Rust's `Drop`.
    fn native_read_file_bytes(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let path = self.arg_str(&args, 0)?;
        let offset = self.arg_int(&args, 1)?;
        let length = self.arg_int(&args, 2)?;
        let buf_ref = match &args[3] {
            Value::Array(r) => *r,
            other => {
                return Err(self.rt_err(format!(
                    "read_file_bytes: expected arr argument, found {}",
                    type_name(other)
                )));
            }
        };
        let buf_offset = self.arg_int(&args, 4)?;

        if offset < 0 || length < 0 || buf_offset < 0 {
            return Ok(Value::Int(-1));
        }

        let mut file = match std::fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(_) => return Ok(Value::Int(-1)),
        };
        if file.seek(SeekFrom::Start(offset as u64)).is_err() {
            return Ok(Value::Int(-1));
        }
        let mut buffer = vec![0u8; length as usize];
        let read = match file.read(&mut buffer) {
            Ok(n) => n,
            Err(_) => return Ok(Value::Int(-1)),
        };

        match buf_ref.kind() {
            ObjectKind::Array(items) => {
                let mut items = items.borrow_mut();
                for (i, byte) in buffer[..read].iter().enumerate() {
                    let slot = buf_offset as usize + i;
                    if slot >= items.len() {
                        break;
                    }
                    items[slot] = Value::Int(*byte as i64);
                }
            }
            _ => unreachable!("Array value must reference an Array object"),
        }
        Ok(Value::Int(read as i64))
    }

    /// `panic(msg)`: a user-facing runtime error that halts the VM
    /// with exit code 1 after printing `PANIC!: <msg>` to stderr.
    fn native_panic(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let msg = self.arg_str(&args, 0)?;
        eprintln!("PANIC!: {msg}");
        let _ = std::io::stderr().flush();
        self.request_stop(1);
        Ok(Value::Nil)
    }

    /// `exit(n)`: a graceful stop with the caller-supplied exit code.
    fn native_exit(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let code = self.arg_int(&args, 0)?;
        self.request_stop(code as i32);
        Ok(Value::Nil)
    }
}

fn cmp_to_int(ordering: std::cmp::Ordering) -> i64 {
    match ordering {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Vm;
    use glint_core::{Chunk, Constants, Entities};

    fn test_vm() -> Vm {
        Vm::new(Entities::new(), Constants::new(), Chunk::new())
    }

    #[test]
    fn cmp_str_orders_lexicographically() {
        let mut vm = test_vm();
        let a = vm.alloc_str("abc");
        let b = vm.alloc_str("abd");
        let result = vm.native_cmp_str(vec![a, b]).unwrap();
        assert!(matches!(result, Value::Int(-1)));
    }

    #[test]
    fn str_title_capitalizes_each_word() {
        let mut vm = test_vm();
        let s = vm.alloc_str("hello world");
        let result = vm.native_str_title(vec![s]).unwrap();
        match result {
            Value::Str(r) => match r.kind() {
                ObjectKind::Str { data, .. } => assert_eq!(data.as_ref(), "Hello World"),
                _ => unreachable!(),
            },
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn char_code_out_of_range_is_runtime_error() {
        let mut vm = test_vm();
        let s = vm.alloc_str("hi");
        let err = vm.native_char_code(vec![s, Value::Int(5)]).unwrap_err();
        assert!(err.message.contains("out of range"));
    }
}
