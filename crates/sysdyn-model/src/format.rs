//! Upload format detection and dispatch.

use serde::{Deserialize, Serialize};

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::ir::ModelIr;

use crate::vensim::parse_vensim;
use crate::xmile::parse_xmile;

/// Accepted model dialects, detected from the uploaded filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Vensim,
    Xmile,
}

impl ModelFormat {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        };
        match ext.as_str() {
            "mdl" => Ok(ModelFormat::Vensim),
            "xmile" | "stmx" | "xml" => Ok(ModelFormat::Xmile),
            "" => Err(SdError::UnsupportedFormat(format!(
                "`{filename}` has no extension; expected .mdl, .xmile, .stmx or .xml"
            ))),
            other => Err(SdError::UnsupportedFormat(format!(
                ".{other} is not a recognized model format (expected .mdl, .xmile, .stmx or .xml)"
            ))),
        }
    }
}

/// Parse an uploaded model. The filename drives format detection and names
/// the model when the file itself does not.
pub fn parse_model(filename: &str, bytes: &[u8]) -> Result<(ModelFormat, ModelIr)> {
    let format = ModelFormat::from_filename(filename)?;
    let src = std::str::from_utf8(bytes)
        .map_err(|_| SdError::Parse("model file is not valid UTF-8".to_string()))?;
    let stem = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .split('.')
        .next()
        .unwrap_or(filename);
    let ir = match format {
        ModelFormat::Vensim => parse_vensim(stem, src)?,
        ModelFormat::Xmile => parse_xmile(stem, src)?,
    };
    ir.specs.validate()?;
    Ok((format, ir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(ModelFormat::from_filename("pop.mdl").unwrap(), ModelFormat::Vensim);
        assert_eq!(ModelFormat::from_filename("pop.MDL").unwrap(), ModelFormat::Vensim);
        assert_eq!(ModelFormat::from_filename("teacup.xmile").unwrap(), ModelFormat::Xmile);
        assert_eq!(ModelFormat::from_filename("teacup.stmx").unwrap(), ModelFormat::Xmile);
        assert!(ModelFormat::from_filename("model.csv").is_err());
        assert!(ModelFormat::from_filename("no_extension").is_err());
    }

    #[test]
    fn non_utf8_payload_is_a_parse_error() {
        let err = parse_model("m.mdl", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, SdError::Parse(_)));
    }
}
