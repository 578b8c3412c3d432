use std::fmt::Debug;

use winnow::{
    binary::{be_u16, be_u32, be_u64, u8},
    combinator::trace,
    error::{ParserError, StrContext, StrContextValue},
    token::rest,
    Bytes, LocatingSlice, ModalResult, Parser,
};

use crate::FourCC;

pub type Stream<'i> = LocatingSlice<&'i Bytes>;

pub fn stream(b: &[u8]) -> Stream<'_> {
    LocatingSlice::new(Bytes::new(b))
}

/// Returns early with [`crate::ParseError::new_unexpected_atom`] unless `$atom_type` is one of the expected types.
macro_rules! assert_atom_type {
    ($atom_type:expr, $($expected:expr),+ $(,)?) => {{
        let atom_type: $crate::FourCC = $atom_type;
        if $(atom_type != $expected)&&+ {
            return Err($crate::ParseError::new_unexpected_atom(
                atom_type,
                [$($expected),+][0],
            ));
        }
    }};
}
pub(crate) use assert_atom_type;

pub fn fourcc(input: &mut Stream<'_>) -> ModalResult<FourCC> {
    trace(
        "fourcc",
        (byte_array)
            .map(FourCC)
            .context(StrContext::Label("fourcc")),
    )
    .parse_next(input)
}

pub fn version(input: &mut Stream<'_>) -> ModalResult<u8> {
    trace("version", u8)
        .context(StrContext::Label("version"))
        .parse_next(input)
}

pub fn version_0_or_1(input: &mut Stream<'_>) -> ModalResult<u8> {
    trace(
        "version_0_or_1",
        version
            .verify(|version| *version <= 1)
            .context(StrContext::Expected(StrContextValue::Description(
                "expected version 0 or 1",
            ))),
    )
    .parse_next(input)
}

pub fn be_u32_as_u64(input: &mut Stream<'_>) -> ModalResult<u64> {
    trace(
        "be_u32_as_u64",
        be_u32
            .map(u64::from)
            .context(StrContext::Expected(StrContextValue::Description("be u32"))),
    )
    .parse_next(input)
}

/// Parses a 32 bit value for version 0 atoms and a 64 bit value for version 1 atoms.
pub fn be_u32_or_u64(version: u8) -> impl FnMut(&mut Stream<'_>) -> ModalResult<u64> {
    move |input: &mut Stream<'_>| match version {
        0 => be_u32_as_u64.parse_next(input),
        _ => be_u64.parse_next(input),
    }
}

pub fn flags3(input: &mut Stream<'_>) -> ModalResult<[u8; 3]> {
    trace("flags", byte_array)
        .context(StrContext::Label("flags"))
        .parse_next(input)
}

pub fn byte_array<const N: usize>(input: &mut Stream<'_>) -> ModalResult<[u8; N]> {
    trace("byte_array", fixed_array(u8)).parse_next(input)
}

pub fn rest_vec<'i>(input: &mut Stream<'i>) -> ModalResult<Vec<u8>> {
    trace("rest_vec", move |input: &mut Stream<'i>| {
        let data = rest.parse_next(input)?;
        Ok(data.to_vec())
    })
    .parse_next(input)
}

pub fn fixed_array<'i, const N: usize, Input, Output, Error, ParseNext>(
    mut parser: ParseNext,
) -> impl Parser<Input, [Output; N], Error> + 'i
where
    Input: winnow::stream::Stream + 'i,
    ParseNext: Parser<Input, Output, Error> + 'i,
    Error: ParserError<Input> + 'i,
    Output: Debug + 'i,
{
    trace("fixed_array", move |input: &mut Input| {
        let mut list: Vec<Output> = Vec::with_capacity(N);
        for _ in 0..N {
            list.push(parser.by_ref().complete_err().parse_next(input)?);
        }
        let out: [Output; N] = list
            .try_into()
            .expect("list has exactly N elements");
        Ok(out)
    })
}

pub const FIXED_POINT_16X16_SCALE: f32 = 65536.0;

pub fn fixed_point_16x16(input: &mut Stream<'_>) -> ModalResult<f32> {
    trace(
        "fixed_point_16_x_16",
        be_u32.map(|v| (v as f32) / FIXED_POINT_16X16_SCALE),
    )
    .parse_next(input)
}

pub const FIXED_POINT_8X8_SCALE: f32 = 256.0;

pub fn fixed_point_8x8(input: &mut Stream<'_>) -> ModalResult<f32> {
    trace(
        "fixed_point_8x8",
        be_u16.map(|v| (v as f32) / FIXED_POINT_8X8_SCALE),
    )
    .parse_next(input)
}

pub mod combinators {
    use winnow::combinator::trace;
    use winnow::error::ParserError;
    use winnow::stream::{Location, Stream, StreamIsPartial, ToUsize, UpdateSlice};
    use winnow::token::take;
    use winnow::Parser;

    /// Like [`winnow::binary::length_and_then`], except the parsed length includes the bytes of the length itself.
    pub fn inclusive_length_and_then<Input, Output, Count, Error, CountParser, ParseNext>(
        mut count: CountParser,
        mut parser: ParseNext,
    ) -> impl Parser<Input, Output, Error>
    where
        Input: StreamIsPartial + Stream + Location + UpdateSlice + Clone,
        Count: ToUsize,
        CountParser: Parser<Input, Count, Error>,
        ParseNext: Parser<Input, Output, Error>,
        Error: ParserError<Input>,
    {
        trace("inclusive_length_and_then", move |i: &mut Input| {
            let size = with_len(count.by_ref().map(|c| c.to_usize()))
                .map(|(a, b)| a.saturating_sub(b))
                .complete_err()
                .parse_next(i)?;
            let data = take(size).parse_next(i)?;
            let mut data = Input::update_slice(i.clone(), data);
            let _ = data.complete();
            let o = parser.by_ref().complete_err().parse_next(&mut data)?;
            Ok(o)
        })
    }

    fn with_len<I, O, E, ParseNext>(mut parser: ParseNext) -> impl Parser<I, (O, usize), E>
    where
        I: Stream + Location,
        E: ParserError<I>,
        ParseNext: Parser<I, O, E>,
    {
        trace("with_len", move |input: &mut I| {
            let start = input.current_token_start();
            parser.by_ref().parse_next(input).map(move |output| {
                let end = input.previous_token_end();
                (output, end - start)
            })
        })
    }
}
