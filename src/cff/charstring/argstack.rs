// This file is derived from ttf-parser, licenced under Apache-2.0.
// https://github.com/RazrFalcon/ttf-parser/blob/439aaaebd50eb8aed66302e3c1b51fae047f85b2/src/tables/cff/argstack.rs

use std::fmt::{self, Debug};

use super::{CharStringError, Number};

/// Storage for the operand stack used while decoding charstrings.
pub struct ArgumentsStack<'a> {
    pub data: &'a mut [Number],
    pub len: usize,
    pub max_len: usize,
}

impl<'a> ArgumentsStack<'a> {
    pub fn new(data: &'a mut [Number]) -> Self {
        let max_len = data.len();
        ArgumentsStack {
            data,
            len: 0,
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, n: Number) -> Result<(), CharStringError> {
        if self.len == self.max_len {
            Err(CharStringError::StackOverflow)
        } else {
            self.data[self.len] = n;
            self.len += 1;
            Ok(())
        }
    }

    pub fn pop(&mut self) -> Result<Number, CharStringError> {
        if self.is_empty() {
            return Err(CharStringError::StackUnderflow);
        }
        self.len -= 1;
        Ok(self.data[self.len])
    }

    /// Pop `n` values from the stack, returning them bottom first.
    pub fn pop_n(&mut self, n: usize) -> Result<&[Number], CharStringError> {
        if n > self.len {
            return Err(CharStringError::StackUnderflow);
        }
        self.len -= n;
        Ok(&self.data[self.len..self.len + n])
    }

    pub fn pop_all(&mut self) -> &[Number] {
        let len = self.len;
        self.len = 0;
        &self.data[..len]
    }

    pub fn all(&self) -> &[Number] {
        &self.data[..self.len]
    }

    /// The value `depth` entries below the top of the stack.
    pub fn peek(&self, depth: usize) -> Result<Number, CharStringError> {
        depth
            .checked_add(1)
            .and_then(|n| self.len.checked_sub(n))
            .map(|index| self.data[index])
            .ok_or(CharStringError::StackUnderflow)
    }

    /// Mutable view of the top `n` entries.
    pub fn top_mut(&mut self, n: usize) -> Result<&mut [Number], CharStringError> {
        if n > self.len {
            return Err(CharStringError::StackUnderflow);
        }
        Ok(&mut self.data[self.len - n..self.len])
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Debug for ArgumentsStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.all()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop() {
        let mut data = [Number::Integer(0); 2];
        let mut stack = ArgumentsStack::new(&mut data);
        stack.push(Number::Integer(1)).unwrap();
        stack.push(Number::Integer(2)).unwrap();
        assert_eq!(stack.push(Number::Integer(3)), Err(CharStringError::StackOverflow));
        assert_eq!(stack.peek(1), Ok(Number::Integer(1)));
        assert_eq!(stack.pop(), Ok(Number::Integer(2)));
        assert_eq!(stack.pop(), Ok(Number::Integer(1)));
        assert_eq!(stack.pop(), Err(CharStringError::StackUnderflow));
    }

    #[test]
    fn pop_n_keeps_order() {
        let mut data = [Number::Integer(0); 4];
        let mut stack = ArgumentsStack::new(&mut data);
        for i in 1..=3 {
            stack.push(Number::Integer(i)).unwrap();
        }
        assert_eq!(
            stack.pop_n(2).unwrap(),
            &[Number::Integer(2), Number::Integer(3)]
        );
        assert_eq!(stack.pop_n(2), Err(CharStringError::StackUnderflow));
        assert_eq!(stack.all(), &[Number::Integer(1)]);
    }
}
