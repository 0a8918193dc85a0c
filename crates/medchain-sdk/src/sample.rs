//! Sample supply-chain dataset used by `medchain demo` and the scenario tests.

use medchain_ledger::TransactionDraft;

/// 2024-01-01T08:00:00Z, the first sample timestamp.
pub const SAMPLE_EPOCH_MS: u64 = 1_704_096_000_000;

/// One hour between sample clock ticks.
pub const SAMPLE_STEP_MS: u64 = 3_600_000;

/// Validation code carried by the rejected sample transaction (MVCC read conflict).
pub const MVCC_READ_CONFLICT: u32 = 11;

/// Sample transactions grouped into the blocks they are sealed as.
pub fn sample_blocks(chaincode: &str) -> Vec<Vec<TransactionDraft>> {
    let tx = |function: &str, creator: &str, org: &str| {
        TransactionDraft::new(chaincode, function, creator)
            .with_endorser(format!("peer0.{org}.medchain.com"))
    };

    vec![
        // batch001: created, then moved through status updates.
        vec![tx("createDrugBatch", "manufacturer-admin", "manufacturer")
            .with_args(["batch001", "Paracetamol", "Acme Pharma", "1000"])
            .with_field("batchId", "batch001")
            .with_field("drugName", "Paracetamol")
            .with_field("manufacturer", "Acme Pharma")
            .with_field("quantity", "1000")
            .with_field("status", "pending")
            .with_field("location", "Acme Pharma Manufacturing")],
        vec![tx("updateBatchStatus", "distributor-admin", "distributor")
            .with_args(["batch001", "waiting"])
            .with_field("batchId", "batch001")
            .with_field("status", "waiting")
            .with_field("location", "Distribution Center")],
        vec![tx("updateBatchStatus", "hospital-admin", "hospital")
            .with_args(["batch001", "success"])
            .with_field("batchId", "batch001")
            .with_field("status", "success")
            .with_field("location", "City Hospital")],
        // batch002, plus a status change the endorsers rejected.
        vec![
            tx("createDrugBatch", "manufacturer-admin", "manufacturer")
                .with_args(["batch002", "Ibuprofen", "Beta Pharma", "500"])
                .with_field("batchId", "batch002")
                .with_field("drugName", "Ibuprofen")
                .with_field("manufacturer", "Beta Pharma")
                .with_field("quantity", "500")
                .with_field("status", "pending")
                .with_field("location", "Beta Pharma Manufacturing"),
            tx("updateBatchStatus", "distributor-admin", "distributor")
                .with_args(["batch002", "recalled"])
                .with_field("batchId", "batch002")
                .with_field("status", "recalled")
                .with_validation_code(MVCC_READ_CONFLICT),
        ],
        vec![tx("updateBatchStatus", "distributor-admin", "distributor")
            .with_args(["batch002", "waiting"])
            .with_field("batchId", "batch002")
            .with_field("status", "waiting")
            .with_field("location", "Regional Distribution Hub")],
        // Full custody of one Paracetamol batch, manufacturer to patient.
        vec![tx("createDrugBatch", "Sun Pharma Manufacturing Team", "manufacturer")
            .with_args(["BATCH-1ldf2g-ABCDE", "Paracetamol 500mg", "Sun Pharma", "1000"])
            .with_field("batchId", "BATCH-1ldf2g-ABCDE")
            .with_field("drugName", "Paracetamol 500mg")
            .with_field("manufacturer", "Sun Pharma")
            .with_field("quantity", 1000)
            .with_field("status", "created")
            .with_field("location", "Sun Pharma Facility, Mumbai")
            .with_field("details", "New drug batch created with 1000 units. QR code generated.")],
        vec![tx("dispatchBatch", "Sun Pharma Logistics Team", "manufacturer")
            .with_args(["BATCH-1ldf2g-ABCDE", "Delhi Distribution Center"])
            .with_field("batchId", "BATCH-1ldf2g-ABCDE")
            .with_field("drugName", "Paracetamol 500mg")
            .with_field("fromEntity", "Sun Pharma Manufacturing")
            .with_field("toEntity", "Delhi Distribution Center")
            .with_field("quantity", 1000)
            .with_field("status", "in-transit")
            .with_field("location", "Sun Pharma Facility, Mumbai")],
        vec![tx("receiveBatch", "Delhi Distribution Center Staff", "distributor")
            .with_args(["BATCH-1ldf2g-ABCDE", "Sun Pharma Manufacturing"])
            .with_field("batchId", "BATCH-1ldf2g-ABCDE")
            .with_field("drugName", "Paracetamol 500mg")
            .with_field("fromEntity", "Sun Pharma Manufacturing")
            .with_field("toEntity", "Delhi Distribution Center")
            .with_field("quantity", 1000)
            .with_field("status", "received")
            .with_field("location", "Delhi Distribution Center")],
        vec![tx("dispatchBatch", "Delhi Distribution Center Manager", "distributor")
            .with_args(["BATCH-1ldf2g-ABCDE", "AIIMS Delhi"])
            .with_field("batchId", "BATCH-1ldf2g-ABCDE")
            .with_field("drugName", "Paracetamol 500mg")
            .with_field("fromEntity", "Delhi Distribution Center")
            .with_field("toEntity", "AIIMS Delhi")
            .with_field("quantity", 500)
            .with_field("status", "in-transit")
            .with_field("location", "Delhi Distribution Center")],
        vec![tx("receiveBatch", "Dr. Sharma - AIIMS Delhi", "hospital")
            .with_args(["BATCH-1ldf2g-ABCDE", "Delhi Distribution Center"])
            .with_field("batchId", "BATCH-1ldf2g-ABCDE")
            .with_field("drugName", "Paracetamol 500mg")
            .with_field("role", "Hospital Staff")
            .with_field("fromEntity", "Delhi Distribution Center")
            .with_field("toEntity", "AIIMS Delhi")
            .with_field("quantity", 500)
            .with_field("status", "received")
            .with_field("location", "AIIMS Delhi")],
        vec![
            tx("verifyPatient", "Dr. Sharma - AIIMS Delhi", "hospital")
                .with_field("role", "Hospital Staff")
                .with_field("location", "AIIMS Delhi")
                .with_field("details", "Patient identity verified with Aadhaar ID and admin passcode."),
            tx("dispenseDrug", "Pharmacist - AIIMS Delhi", "hospital")
                .with_args(["BATCH-1ldf2g-ABCDE", "30"])
                .with_field("batchId", "BATCH-1ldf2g-ABCDE")
                .with_field("drugName", "Paracetamol 500mg")
                .with_field("role", "Pharmacy Staff")
                .with_field("fromEntity", "AIIMS Delhi")
                .with_field("toEntity", "Patient: Rajesh Kumar")
                .with_field("quantity", 30)
                .with_field("status", "dispensed")
                .with_field("location", "AIIMS Delhi Pharmacy Counter"),
        ],
        // Two batches still moving: one received and held, one in transit.
        vec![
            tx("createDrugBatch", "Cipla Manufacturing Team", "manufacturer")
                .with_args(["BATCH-2mxk9p-FGHIJ", "Amoxicillin 250mg", "Cipla", "800"])
                .with_field("batchId", "BATCH-2mxk9p-FGHIJ")
                .with_field("drugName", "Amoxicillin 250mg")
                .with_field("manufacturer", "Cipla")
                .with_field("quantity", 800)
                .with_field("status", "created")
                .with_field("location", "Cipla Plant, Goa"),
            tx("createDrugBatch", "Dr. Reddy's Manufacturing Team", "manufacturer")
                .with_args(["BATCH-3qrt7w-KLMNO", "Metformin 500mg", "Dr. Reddy's", "400"])
                .with_field("batchId", "BATCH-3qrt7w-KLMNO")
                .with_field("drugName", "Metformin 500mg")
                .with_field("manufacturer", "Dr. Reddy's")
                .with_field("quantity", 400)
                .with_field("status", "created")
                .with_field("location", "Dr. Reddy's Plant, Hyderabad"),
        ],
        vec![
            tx("dispatchBatch", "Cipla Logistics Team", "manufacturer")
                .with_args(["BATCH-2mxk9p-FGHIJ", "Mumbai Distribution Hub"])
                .with_field("batchId", "BATCH-2mxk9p-FGHIJ")
                .with_field("fromEntity", "Cipla Manufacturing")
                .with_field("toEntity", "Mumbai Distribution Hub")
                .with_field("quantity", 800)
                .with_field("status", "in-transit"),
            tx("dispatchBatch", "Dr. Reddy's Logistics Team", "manufacturer")
                .with_args(["BATCH-3qrt7w-KLMNO", "Rural Health Center - Rajasthan"])
                .with_field("batchId", "BATCH-3qrt7w-KLMNO")
                .with_field("fromEntity", "Dr. Reddy's Manufacturing")
                .with_field("toEntity", "Rural Health Center - Rajasthan")
                .with_field("quantity", 400)
                .with_field("status", "in-transit"),
        ],
        vec![
            tx("receiveBatch", "Mumbai Distribution Hub Staff", "distributor")
                .with_args(["BATCH-2mxk9p-FGHIJ", "Cipla Manufacturing"])
                .with_field("batchId", "BATCH-2mxk9p-FGHIJ")
                .with_field("fromEntity", "Cipla Manufacturing")
                .with_field("toEntity", "Mumbai Distribution Hub")
                .with_field("quantity", 800)
                .with_field("status", "received")
                .with_field("location", "Mumbai Distribution Hub"),
            tx("raiseStockAlert", "AI Monitoring System", "distributor")
                .with_field("role", "System")
                .with_field("drugName", "Metformin 500mg")
                .with_field("location", "Rural Health Center - Rajasthan")
                .with_field("details", "Stock below rural priority threshold. Current: 25 units, Required: 80 units."),
        ],
    ]
}
