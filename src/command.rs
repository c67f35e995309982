use bytes::Bytes;
use std::fmt;

/// An ordered list of arguments sent as one request. The first argument is the verb.
///
/// Built once per call and never mutated after it is handed to the client.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &str) -> Command {
        Command {
            args: vec![Bytes::copy_from_slice(name.as_bytes())],
        }
    }

    pub fn arg(mut self, arg: impl ToArg) -> Command {
        self.args.push(arg.to_arg());
        self
    }

    pub fn args_from<I>(mut self, args: I) -> Command
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.args.extend(args.into_iter().map(|arg| arg.to_arg()));
        self
    }

    /// Lowercase verb, used for logging.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).to_lowercase()
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Exact number of bytes the request occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        let header = 1 + digits(self.args.len()) + 2;
        let blocks: usize = self
            .args
            .iter()
            .map(|arg| 1 + digits(arg.len()) + 2 + arg.len() + 2)
            .sum();
        header + blocks
    }
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", String::from_utf8_lossy(arg))?;
            first = false;
        }
        Ok(())
    }
}

/// Conversion into a single wire argument. Numbers are sent in their decimal text form.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for &str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for &String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for &[u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

macro_rules! to_arg_display {
    ($($ty:ty),*) => {
        $(
            impl ToArg for $ty {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

to_arg_display!(i32, i64, u32, u64, usize, f64, &f64);
