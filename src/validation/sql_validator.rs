use sqlparser::ast::Statement;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

use crate::error::AstroError;

/// Query text validation ahead of submission to a catalog service
pub struct SqlValidator;

impl SqlValidator {
    /// Validate that the query is a single read-only SELECT.
    ///
    /// SkyServer runs T-SQL and Gaia runs ADQL; both use `TOP n`, which the
    /// MS SQL dialect understands.
    pub fn validate_select_only(sql: &str) -> Result<String, AstroError> {
        if sql.trim().is_empty() {
            return Err(AstroError::Validation("Empty SQL query".to_string()));
        }

        let dialect = MsSqlDialect {};
        let ast = Parser::new(&dialect)
            .try_with_sql(sql)
            .and_then(|mut parser| parser.parse_statements())
            .map_err(|e| AstroError::Validation(format!("SQL parsing error: {}", e)))?;

        if ast.is_empty() {
            return Err(AstroError::Validation("Empty SQL query".to_string()));
        }
        if ast.len() > 1 {
            return Err(AstroError::Validation(format!(
                "Expected a single statement, found {}",
                ast.len()
            )));
        }

        match &ast[0] {
            Statement::Query(_) => Ok(sql.trim().to_string()),
            Statement::Insert { .. } | Statement::Update { .. } | Statement::Delete { .. } => {
                Err(AstroError::Validation(
                    "Data modification statements are not allowed. Only SELECT queries are permitted."
                        .to_string(),
                ))
            }
            other => Err(AstroError::Validation(format!(
                "Only SELECT queries are permitted. Found: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_select_only() {
        // SkyServer style
        let sql = "SELECT top 10 z, ra, dec, bestObjID FROM specObj \
                   WHERE class = 'galaxy' AND z > 0.3 AND zWarning = 0";
        assert!(SqlValidator::validate_select_only(sql).is_ok());

        // ADQL style
        let sql = "SELECT * FROM gaiadr3.sdssdr13_best_neighbour \
                   WHERE angular_distance < 2 AND original_ext_source_id IN (1, 2)";
        assert!(SqlValidator::validate_select_only(sql).is_ok());

        assert!(SqlValidator::validate_select_only("INSERT INTO specObj VALUES (1)").is_err());
        assert!(SqlValidator::validate_select_only("DELETE FROM specObj").is_err());
        assert!(SqlValidator::validate_select_only("DROP TABLE specObj").is_err());
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        for sql in ["", "   \n", "invalid_query"] {
            let err = SqlValidator::validate_select_only(sql).unwrap_err();
            assert!(matches!(err, AstroError::Validation(_)), "{:?}", sql);
        }
    }

    #[test]
    fn test_rejects_multiple_statements() {
        let err = SqlValidator::validate_select_only("SELECT 1; SELECT 2").unwrap_err();
        assert!(err.to_string().contains("single statement"));
    }

    #[test]
    fn test_join_query_with_keyword_columns() {
        let sql = "SELECT p.objid, p.ra, p.dec, s.class, s.z as redshift \
                   FROM PhotoObj AS p JOIN SpecObj AS s ON s.bestobjid = p.objid \
                   WHERE s.plate = 382";
        assert!(SqlValidator::validate_select_only(sql).is_ok());
    }
}
