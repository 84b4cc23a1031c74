use datafusion::arrow::array::AsArray;
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;
use std::path::Path;

use crate::error::AstroError;
use crate::services::QueryHandler;
use crate::table;

const PLATE_COLUMN: &str = "PLATE";
const MJD_COLUMN: &str = "MJD";
const RA_COLUMN: &str = "RACEN";
const DEC_COLUMN: &str = "DECCEN";

/// Reads header-level metadata from a spectrum file and looks up the
/// matching photometric and spectroscopic records on SkyServer.
pub struct MetaDataExtractor {
    table: RecordBatch,
    query_handler: QueryHandler,
}

impl MetaDataExtractor {
    /// Load the first extension of a FITS file, or a CSV file with the same
    /// columns. `query_handler` should be bound to SDSS.
    pub fn open(path: impl AsRef<Path>, query_handler: QueryHandler) -> Result<Self, AstroError> {
        let table = table::load_table(path.as_ref())?;
        Ok(Self {
            table,
            query_handler,
        })
    }

    pub fn table(&self) -> &RecordBatch {
        &self.table
    }

    pub fn query_handler(&self) -> &QueryHandler {
        &self.query_handler
    }

    /// Plate centre coordinates as `(RACEN, DECCEN)`.
    pub fn get_coordinates(&self) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>), AstroError> {
        Ok((
            table::numeric_column(&self.table, RA_COLUMN)?,
            table::numeric_column(&self.table, DEC_COLUMN)?,
        ))
    }

    pub fn get_identifiers(&self) -> Result<RecordBatch, AstroError> {
        table::select_columns(&self.table, &[PLATE_COLUMN, MJD_COLUMN])
    }

    pub fn get_metadata<S: AsRef<str>>(&self, columns: &[S]) -> Result<RecordBatch, AstroError> {
        table::select_columns(&self.table, columns)
    }

    /// Spectroscopic class (`GALAXY`, `QSO`, `STAR`) of the matching objects.
    pub async fn get_class_of_object(&mut self) -> Result<Option<Vec<String>>, AstroError> {
        let Some(records) = self.extract_more_metadata().await? else {
            return Ok(None);
        };
        let column = records
            .column_by_name("class")
            .ok_or_else(|| AstroError::missing_column("class"))?;
        let text = cast(column, &DataType::Utf8)?;
        Ok(Some(
            text.as_string::<i32>()
                .iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect(),
        ))
    }

    pub async fn get_redshift(&mut self) -> Result<Option<Vec<Option<f64>>>, AstroError> {
        match self.extract_more_metadata().await? {
            Some(records) => Ok(Some(table::numeric_column(&records, "redshift")?)),
            None => Ok(None),
        }
    }

    async fn extract_more_metadata(&mut self) -> Result<Option<RecordBatch>, AstroError> {
        let plate = self.first_value(PLATE_COLUMN)?;
        let ra = self.first_value(RA_COLUMN)?;
        let dec = self.first_value(DEC_COLUMN)?;

        let sql = extraction_query(plate as i64, ra, dec);
        let query_id = self.query_handler.run_query(&sql).await?;
        self.query_handler.get_results(&query_id)
    }

    fn first_value(&self, column: &str) -> Result<f64, AstroError> {
        table::numeric_column(&self.table, column)?
            .first()
            .copied()
            .flatten()
            .ok_or_else(|| AstroError::Validation(format!("Column '{}' has no value", column)))
    }
}

fn extraction_query(plate: i64, ra: f64, dec: f64) -> String {
    format!(
        "SELECT p.objid, p.ra, p.dec, p.u, p.g, p.r, p.i, p.z, \
         p.run, p.rerun, p.camcol, p.field, \
         s.specobjid, s.class, s.z AS redshift, s.plate, s.mjd, s.fiberid \
         FROM PhotoObj AS p JOIN SpecObj AS s ON s.bestobjid = p.objid \
         WHERE s.plate = {} AND p.ra = {} AND p.dec = {}",
        plate, ra, dec
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mockito::Matcher;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER_CSV: &str = "PLATE,MJD,RACEN,DECCEN,TILE\n266,51602,146.71421,-1.04128,10\n";

    fn header_file() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(HEADER_CSV.as_bytes()).unwrap();
        file
    }

    fn extractor(file: &NamedTempFile, sdss_url: String) -> MetaDataExtractor {
        let mut config = Config::default();
        config.sdss.base_url = sdss_url;
        config.sdss.timeout_secs = 5;
        let handler = QueryHandler::new("SDSS", config).unwrap();
        MetaDataExtractor::open(file.path(), handler).unwrap()
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let handler = QueryHandler::new("SDSS", Config::default()).unwrap();
        let err = MetaDataExtractor::open("/nonexistent/spec-0266-51602-0001.csv", handler)
            .err()
            .unwrap();
        assert!(matches!(err, AstroError::Io(_)));
    }

    #[test]
    fn test_local_metadata() {
        let file = header_file();
        let extractor = extractor(&file, "http://127.0.0.1:1".to_string());

        let (ra, dec) = extractor.get_coordinates().unwrap();
        assert_eq!(ra, vec![Some(146.71421)]);
        assert_eq!(dec, vec![Some(-1.04128)]);

        let ids = extractor.get_identifiers().unwrap();
        assert_eq!(ids.num_columns(), 2);
        assert_eq!(ids.schema().field(0).name(), "PLATE");

        let subset = extractor.get_metadata(&["TILE", "MJD"]).unwrap();
        assert_eq!(subset.schema().field(0).name(), "TILE");

        let err = extractor.get_metadata(&["TILE", "EXPTIME"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: one or more field names you provided do not exist in the metadata."
        );
    }

    #[tokio::test]
    async fn test_class_and_redshift_lookup() {
        let mut server = mockito::Server::new_async().await;
        let sql = extraction_query(266, 146.71421, -1.04128);
        let mock = server
            .mock("GET", "/SkyServerWS/SearchTools/SqlSearch")
            .match_query(Matcher::UrlEncoded("cmd".into(), sql))
            .with_status(200)
            .with_body(
                "#Table1\nobjid,ra,dec,specobjid,class,redshift,plate,mjd,fiberid\n\
                 1237648720693755918,146.71421,-1.04128,299489676975171584,GALAXY,0.02127545,266,51602,1\n",
            )
            .expect(2)
            .create_async()
            .await;

        let file = header_file();
        let mut extractor = extractor(&file, server.url());

        let classes = extractor.get_class_of_object().await.unwrap().unwrap();
        assert_eq!(classes, vec!["GALAXY".to_string()]);

        let redshift = extractor.get_redshift().await.unwrap().unwrap();
        assert_eq!(redshift, vec![Some(0.02127545)]);

        mock.assert_async().await;
        assert_eq!(extractor.query_handler().jobs().len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_without_match() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SkyServerWS/SearchTools/SqlSearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("#Table1\n")
            .create_async()
            .await;

        let file = header_file();
        let mut extractor = extractor(&file, server.url());
        assert!(extractor.get_redshift().await.unwrap().is_none());
    }

    #[cfg(feature = "fits")]
    #[test]
    fn test_coordinates_from_fits_header_table() {
        use crate::table::fits::test_util::write_double_table;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("spec-0266-51602-0001.fits");
        write_double_table(
            &path,
            &[
                ("PLATE", vec![266.0]),
                ("RACEN", vec![146.71421]),
                ("DECCEN", vec![-1.04128]),
            ],
        );

        let handler = QueryHandler::new("SDSS", Config::default()).unwrap();
        let extractor = MetaDataExtractor::open(&path, handler).unwrap();
        let (ra, dec) = extractor.get_coordinates().unwrap();
        assert_eq!(ra, vec![Some(146.71421)]);
        assert_eq!(dec, vec![Some(-1.04128)]);
    }
}
