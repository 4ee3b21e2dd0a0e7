use crate::types::*;

/// Largest batch accepted in one request.
pub const MAX_ROWS: usize = 5000;

/// Validates submitted lines and turns them into production items with
/// batch-unique ids (`"{referencia}-{cor}-{tamanho}-{row}"`, rows from 1).
pub fn ingest(inputs: Vec<ItemInput>, max_rows: usize) -> Result<Vec<ProductionItem>> {
    if inputs.is_empty() {
        return Err(OptimizerError::InvalidInput(
            "At least one item must be provided".to_string(),
        ));
    }

    if inputs.len() > max_rows {
        return Err(OptimizerError::TooManyItems {
            count: inputs.len(),
            max: max_rows,
        });
    }

    inputs
        .into_iter()
        .enumerate()
        .map(|(idx, input)| {
            let row = idx + 1;
            let referencia = required(input.referencia, "referencia", row)?;
            let cor = required(input.cor, "cor", row)?;
            let tamanho = required(input.tamanho, "tamanho", row)?;
            let id = format!("{}-{}-{}-{}", referencia, cor, tamanho, row);

            let qtd = match u32::try_from(input.qtd) {
                Ok(qtd) if qtd > 0 => qtd,
                _ => {
                    return Err(OptimizerError::InvalidQuantity {
                        item_id: id,
                        qtd: input.qtd,
                    })
                }
            };

            Ok(ProductionItem::new(id, referencia, cor, tamanho, qtd))
        })
        .collect()
}

fn required(value: String, field: &str, row: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OptimizerError::InvalidInput(format!(
            "Row {}: '{}' is required",
            row, field
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(referencia: &str, cor: &str, tamanho: &str, qtd: i64) -> ItemInput {
        ItemInput {
            referencia: referencia.to_string(),
            cor: cor.to_string(),
            tamanho: tamanho.to_string(),
            qtd,
        }
    }

    #[test]
    fn test_ids_are_unique_per_row() {
        let items = ingest(
            vec![input(" RefA ", "Azul", "M", 24), input("RefA", "Azul", "M", 36)],
            MAX_ROWS,
        )
        .unwrap();

        assert_eq!(items[0].id, "RefA-Azul-M-1");
        assert_eq!(items[1].id, "RefA-Azul-M-2");
        assert_eq!(items[0].referencia, "RefA");
        assert!(items.iter().all(|i| i.editavel && i.qtd_otimizada.is_none()));
    }

    #[test]
    fn test_non_positive_quantities_are_rejected() {
        for qtd in [0, -5] {
            let err = ingest(vec![input("RefA", "Azul", "M", qtd)], MAX_ROWS).unwrap_err();
            assert!(matches!(err, OptimizerError::InvalidQuantity { qtd: q, .. } if q == qtd));
        }
    }

    #[test]
    fn test_row_cap_is_enforced() {
        let inputs: Vec<ItemInput> = (0..3).map(|_| input("RefA", "Azul", "M", 12)).collect();
        let err = ingest(inputs, 2).unwrap_err();
        assert!(matches!(err, OptimizerError::TooManyItems { count: 3, max: 2 }));
    }

    #[test]
    fn test_blank_fields_and_empty_batch_are_rejected() {
        assert!(matches!(
            ingest(vec![input("RefA", " ", "M", 12)], MAX_ROWS),
            Err(OptimizerError::InvalidInput(_))
        ));
        assert!(matches!(
            ingest(Vec::new(), MAX_ROWS),
            Err(OptimizerError::InvalidInput(_))
        ));
    }
}
