use snafu::ensure;

use crate::errors::{self, DecodeError};
use self::inner::DecodeCompositeInner;

/// Walks an object/tuple wire payload: a `uint32` element count followed
/// by `(4-byte reserved, i32 length, payload)` per element, `-1` length
/// marking an unset (NULL) element.
pub struct DecodeTupleLike<'t> {
    inner: DecodeCompositeInner<'t>,
}

impl<'t> DecodeTupleLike<'t> {
    fn new(buf: &'t [u8]) -> Result<Self, DecodeError> {
        let inner = DecodeCompositeInner::read_tuple_like_header(buf)?;
        Ok(DecodeTupleLike { inner })
    }

    pub fn new_object(buf: &'t [u8], expected_count: usize) -> Result<Self, DecodeError> {
        let elements = Self::new(buf)?;
        ensure!(
            elements.inner.count() == expected_count,
            errors::DescriptorMismatch {
                message: format!(
                    "expected {} object fields, got {}",
                    expected_count,
                    elements.inner.count()
                ),
            }
        );
        Ok(elements)
    }

    pub fn new_tuple(buf: &'t [u8], expected_count: usize) -> Result<Self, DecodeError> {
        let elements = Self::new(buf)?;
        ensure!(
            elements.inner.count() == expected_count,
            errors::DescriptorMismatch {
                message: format!(
                    "expected {}-tuple, got {} elements",
                    expected_count,
                    elements.inner.count()
                ),
            }
        );
        Ok(elements)
    }

    pub fn read(&mut self) -> Result<Option<&'t [u8]>, DecodeError> {
        self.inner.read_object_element()
    }

    pub fn skip_element(&mut self) -> Result<(), DecodeError> {
        self.read()?;
        Ok(())
    }
}

/// Walks an array/set wire payload: dimension header followed by
/// `(i32 length, payload)` per element.
pub struct DecodeArrayLike<'t> {
    inner: DecodeCompositeInner<'t>,
}

impl<'t> DecodeArrayLike<'t> {
    pub fn new_array(buf: &'t [u8]) -> Result<Self, DecodeError> {
        let inner = DecodeCompositeInner::read_array_like_header(buf)?;
        Ok(DecodeArrayLike { inner })
    }

    pub fn new_collection(buf: &'t [u8]) -> Result<Self, DecodeError> {
        let inner = DecodeCompositeInner::read_array_like_header(buf)?;
        Ok(DecodeArrayLike { inner })
    }
}

impl<'t> Iterator for DecodeArrayLike<'t> {
    type Item = Result<&'t [u8], DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len() > 0 {
            Some(self.inner.read_array_like_element())
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DecodeArrayLike<'_> {
    fn len(&self) -> usize {
        self.inner.count()
    }
}

mod inner {
    use bytes::Buf;
    use snafu::ensure;

    use crate::errors::{self, DecodeError};

    pub(super) struct DecodeCompositeInner<'t> {
        raw: &'t [u8],
        count: usize,
    }

    impl std::fmt::Debug for DecodeCompositeInner<'_> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "count = {} data = {:x?}", self.count, self.raw)
        }
    }

    impl<'t> DecodeCompositeInner<'t> {
        fn underflow(&mut self) -> errors::DecodeError {
            self.raw = &[];
            errors::Underflow.build()
        }

        pub fn count(&self) -> usize {
            self.count
        }

        fn new(bytes: &'t [u8], count: usize) -> Self {
            DecodeCompositeInner { raw: bytes, count }
        }

        fn read_element(&mut self, position: usize) -> Result<&'t [u8], DecodeError> {
            assert!(self.count() > 0, "reading from a finished elements sequence");
            self.count -= 1;
            if self.raw.len() < position {
                return Err(self.underflow());
            }
            let result = &self.raw[..position];
            self.raw.advance(position);
            Ok(result)
        }

        pub fn read_object_element(&mut self) -> Result<Option<&'t [u8]>, DecodeError> {
            if self.raw.remaining() < 8 {
                return Err(self.underflow());
            }
            let _reserved = self.raw.get_i32();
            let len = self.raw.get_i32();
            if len < 0 {
                ensure!(len == -1, errors::InvalidMarker { marker: len });
                return Ok(None);
            }
            Ok(Some(self.read_element(len as usize)?))
        }

        pub fn read_array_like_element(&mut self) -> Result<&'t [u8], DecodeError> {
            if self.raw.remaining() < 4 {
                return Err(self.underflow());
            }
            let len = self.raw.get_i32() as usize;
            self.read_element(len)
        }

        pub fn read_tuple_like_header(mut buf: &'t [u8]) -> Result<Self, DecodeError> {
            ensure!(buf.remaining() >= 4, errors::Underflow);
            let count = buf.get_u32() as usize;
            Ok(Self::new(buf, count))
        }

        pub fn read_array_like_header(mut buf: &'t [u8]) -> Result<Self, DecodeError> {
            ensure!(buf.remaining() >= 12, errors::Underflow);
            let ndims = buf.get_u32();
            let _reserved0 = buf.get_u32();
            let _reserved1 = buf.get_u32();
            if ndims == 0 {
                return Ok(Self::new(buf, 0));
            }
            ensure!(ndims == 1, errors::InvalidArrayShape { dimensions: ndims });
            ensure!(buf.remaining() >= 8, errors::Underflow);
            let size = buf.get_u32() as usize;
            let lower = buf.get_u32();
            ensure!(lower == 1, errors::InvalidArrayShape { dimensions: ndims });
            Ok(Self::new(buf, size))
        }
    }
}
